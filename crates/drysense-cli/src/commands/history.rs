use drysense_core::storage::Database;

pub fn run(limit: usize, stats: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    if stats {
        println!("{}", serde_json::to_string_pretty(&db.stats()?)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&db.history(limit)?)?);
    }
    Ok(())
}
