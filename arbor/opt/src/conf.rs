use crate::analysis::access::AccessManager;
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;

/// The value returned from parsing an option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseVal {
    /// A boolean option.
    Bool(bool),
    /// A number option.
    Num(i64),
}

impl ParseVal {
    pub fn bool(&self) -> bool {
        let ParseVal::Bool(b) = self else {
            panic!("Expected bool, got {self}");
        };
        *b
    }

    pub fn num(&self) -> i64 {
        let ParseVal::Num(n) = self else {
            panic!("Expected number, got {self}");
        };
        *n
    }

    /// The value as a nonnegative number; `None` for booleans and negative
    /// numbers.
    pub fn pos_num(&self) -> Option<u64> {
        match self {
            ParseVal::Num(n) => u64::try_from(*n).ok(),
            ParseVal::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for ParseVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseVal::Bool(b) => write!(f, "{b}"),
            ParseVal::Num(n) => write!(f, "{n}"),
        }
    }
}

/// Option that can be passed to an analysis.
pub struct AnalysisOpt {
    name: &'static str,
    description: &'static str,
    default: ParseVal,
    parse: fn(&str) -> Option<ParseVal>,
}

impl AnalysisOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: ParseVal,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Self {
        Self {
            name,
            description,
            default,
            parse,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> &ParseVal {
        &self.default
    }

    fn parse(&self, s: &str) -> Option<ParseVal> {
        (self.parse)(s)
    }

    pub fn parse_bool(s: &str) -> Option<ParseVal> {
        match s {
            "true" => Some(ParseVal::Bool(true)),
            "false" => Some(ParseVal::Bool(false)),
            _ => None,
        }
    }

    /// Parse a number from a string.
    pub fn parse_num(s: &str) -> Option<ParseVal> {
        s.parse::<i64>().ok().map(ParseVal::Num)
    }
}

/// Trait that describes named analyses.
pub trait Named {
    /// The name of an analysis. Is used for identifying its options.
    fn name() -> &'static str;
    /// A short description of the analysis.
    fn description() -> &'static str;
    /// Set of options that can be passed to the analysis.
    fn opts() -> Vec<AnalysisOpt> {
        vec![]
    }

    /// Values of the options of this analysis found in `extra_opts`, with
    /// defaults for the missing ones. The format of an option is either
    /// `analysis:opt` or `analysis:opt=val`.
    fn get_opts(extra_opts: &[String]) -> LinkedHashMap<&'static str, ParseVal>
    where
        Self: Sized,
    {
        let opts = Self::opts();
        let n = Self::name();
        let mut values: LinkedHashMap<&'static str, ParseVal> = extra_opts
            .iter()
            .filter_map(|opt| {
                let mut splits = opt.split(':');
                if splits.next()? != n {
                    return None;
                }
                let mut splits = splits.next()?.split('=');
                let opt = splits.next()?;
                let Some(opt) = opts.iter().find(|o| o.name == opt) else {
                    log::warn!("Ignoring unknown option for analysis `{n}`: {opt}");
                    return None;
                };
                let val = if let Some(v) = splits.next() {
                    let Some(v) = opt.parse(v) else {
                        log::warn!(
                            "Ignoring invalid value for option `{n}:{}`: {v}",
                            opt.name(),
                        );
                        return None;
                    };
                    v
                } else if let ParseVal::Bool(_) = opt.default {
                    ParseVal::Bool(true)
                } else {
                    log::warn!(
                        "Ignoring option `{n}:{}` without a value",
                        opt.name(),
                    );
                    return None;
                };
                Some((opt.name(), val))
            })
            .collect();

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Extra options for {}: {}",
                Self::name(),
                values.iter().map(|(o, v)| format!("{o}->{v}")).join(", ")
            );
        }

        // For all options that were not provided with values, fill in the defaults.
        for opt in opts {
            if !values.contains_key(opt.name()) {
                values.insert(opt.name(), opt.default.clone());
            }
        }

        values
    }
}

/// Switches of the access analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisConf {
    /// Merge array and tuple accesses using data paths and index ranges.
    /// Otherwise such accesses to one variable are reported as unsupported.
    pub range_merge: bool,
    /// Keep array accesses with symbolic ranges of different contexts in
    /// separate classes. Otherwise they are assumed to overlap.
    pub strict_context: bool,
    /// Maximal number of iteration points enumerated by a range test.
    pub enum_bound: u64,
}

impl Default for AnalysisConf {
    fn default() -> Self {
        Self {
            range_merge: true,
            strict_context: true,
            enum_bound: 256,
        }
    }
}

impl AnalysisConf {
    /// Reads the configuration from `-x analysis:opt=val` options.
    pub fn from_opts(extra_opts: &[String]) -> Self {
        let opts = AccessManager::get_opts(extra_opts);
        let default = Self::default();
        Self {
            range_merge: opts["range-merge"].bool(),
            strict_context: opts["strict-context"].bool(),
            enum_bound: opts["enum-bound"].pos_num().unwrap_or_else(|| {
                log::warn!(
                    "Ignoring enum bound {}, using {}",
                    opts["enum-bound"],
                    default.enum_bound
                );
                default.enum_bound
            }),
        }
    }
}
