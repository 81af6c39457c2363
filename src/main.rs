use arbor::driver;
use arbor_utils::ArborResult;

fn main() -> ArborResult<()> {
    driver::run_analyses()
}
