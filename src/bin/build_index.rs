use std::error::Error;

use eegsplit::cli::run_build_index;

fn main() -> Result<(), Box<dyn Error>> {
    run_build_index(std::env::args().skip(1))
}
