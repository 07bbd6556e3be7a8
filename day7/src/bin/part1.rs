use day7::{size_smallest, SMALL_DIR_LIMIT};
use util::read_input_as_string;

use anyhow::Result;

fn main() -> Result<()> {
    let res = size_smallest(read_input_as_string(None)?.lines(), SMALL_DIR_LIMIT)?;

    println!("{res}");

    Ok(())
}
