use day7::{size_to_delete, SPACE_NEEDED, TOTAL_CAPACITY};
use util::read_input_as_string;

use anyhow::Result;

fn main() -> Result<()> {
    let res = size_to_delete(
        read_input_as_string(None)?.lines(),
        TOTAL_CAPACITY,
        SPACE_NEEDED,
    )?;

    println!("{res}");

    Ok(())
}
