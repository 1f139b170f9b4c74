//! Build a rainfall file in memory, save it, edit it and load it back.

use chrono::{NaiveDate, TimeDelta};
use hydrofile::FileModel;
use hydrofile::bui::{BuiModel, EventList, PrecipitationEvent, Reading};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;

    let start = NaiveDate::from_ymd_opt(1996, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or("invalid start time")?;
    let rows = ["0.2 0.0", "0.35 0.1", "0.10 0.05"]
        .iter()
        .map(|row| row.split(' ').map(Reading::new).collect())
        .collect::<Result<Vec<Vec<Reading>>, _>>()?;
    let event = PrecipitationEvent::new(start, TimeDelta::hours(3), rows);
    let events = EventList::new(vec![event]).ok_or("no events")?;

    let mut model = BuiModel::new(vec!["De_Bilt".into(), "Cabauw".into()], 3600, events);
    let path = model.save(dir.path())?;
    println!("Saved to {}\n", path.display());
    println!("{}", std::fs::read_to_string(&path)?);

    // Explicit fields win over the file's contents.
    let edited: BuiModel = BuiModel::builder()
        .location(&path)
        .field("seconds_per_timestep", 1800)
        .build()?;
    println!(
        "Reloaded {} station(s), {} event(s), {} s per timestep",
        edited.station_names.len(),
        edited.events.len(),
        edited.seconds_per_timestep
    );
    for event in &edited.events {
        let total: f64 = event.values.iter().flatten().map(Reading::value).sum();
        println!("  {} lasting {}s: {total:.2} mm", event.start_time, event.duration.num_seconds());
    }

    Ok(())
}
