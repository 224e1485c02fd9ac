use std::io;
use std::path::Path;
use tokio::fs::read_to_string;

use crate::zones::{deserialise, ZoneStore};

/// Read a zone database.
///
/// The outer `Result` is for reading the file, the inner one for
/// parsing it.
pub async fn zone_from_file<P: AsRef<Path>>(
    path: P,
) -> io::Result<Result<ZoneStore, deserialise::Error>> {
    let data = read_to_string(path).await?;
    Ok(ZoneStore::deserialise(&data))
}
