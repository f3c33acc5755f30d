use miette::Result;
use minivite_core::VERSION;

pub fn run() -> Result<()> {
    println!("minivite {VERSION}");
    Ok(())
}
