use anyhow::Result;
use germline_sim::input;
use std::path::Path;

pub fn validate_file(parameter_file: &Path) -> Result<()> {
    input::check_file(parameter_file)?;
    println!("✓ {} is a valid parameter file", parameter_file.display());
    Ok(())
}
