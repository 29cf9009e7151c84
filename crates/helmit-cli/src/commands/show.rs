//! Show command - load, validate and print chart information

use std::path::Path;

use crate::error::Result;

pub fn run(path: &Path) -> Result<()> {
    let chart = helmit_core::load_chart(path)?;
    let meta = chart.metadata.unwrap_or_default();

    println!("Chart Name: {}", meta.name);
    println!("Chart Description: {}", meta.description);
    println!("Chart Version: {}", meta.version);

    Ok(())
}
