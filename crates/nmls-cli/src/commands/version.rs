use miette::Result;
use nmls_core::version::version_string;

pub fn run() -> Result<()> {
    println!("{}", version_string());
    Ok(())
}
