use argh::FromArgs;

#[derive(FromArgs, Debug)]
#[argh(help_triggers("-h", "--help"))]
/// Runs the arbor analyses on a built-in kernel.
pub struct Opts {
    /// name of the kernel to analyse
    #[argh(positional)]
    pub kernel: Option<String>,

    /// list the built-in kernels and the analysis options
    #[argh(switch, long = "list")]
    pub list: bool,

    /// print the kernel before analysing it
    #[argh(switch, short = 'p', long = "print")]
    pub print: bool,

    /// extra options for the analyses, as `analysis:opt` or
    /// `analysis:opt=val`
    #[argh(option, short = 'x', long = "extra-opt")]
    pub extra_opts: Vec<String>,

    /// logging level
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}

impl Opts {
    /// Parses the command line arguments.
    pub fn get_opts() -> Opts {
        argh::from_env()
    }
}
