use std::env;
use synth_control::data::{parse_timestamp, RecordLoader};
use synth_control::pipeline::{Period, Pipeline, PipelineConfig};
use synth_control::summary::annual_consumption;

/// Usage: csv_pipeline <readings.csv> <p1 start> <p1 end> <p2 start> <p2 end> [config.json] [estimate.csv]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 6 {
        eprintln!(
            "Usage: {} <readings.csv> <p1 start> <p1 end> <p2 start> <p2 end> [config.json] [estimate.csv]",
            args[0]
        );
        std::process::exit(1);
    }

    let config = match args.get(6) {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    println!("Loading {}...", args[1]);
    let records = RecordLoader::from_csv(&args[1], &config.columns)?;
    println!(
        "Loaded {} records for {} houses",
        records.len(),
        records.house_ids().len()
    );

    let period1 = Period::new(parse_timestamp(&args[2])?, parse_timestamp(&args[3])?)?;
    let period2 = Period::new(parse_timestamp(&args[4])?, parse_timestamp(&args[5])?)?;

    let before = records.within(period1.start, period1.end)?;
    if let Ok((treatment, control)) = annual_consumption(&before) {
        println!(
            "Mean annual consumption before treatment: treatment {:.1} kWh, control {:.1} kWh",
            treatment, control
        );
    }

    let output = Pipeline::new(config)?.run_periods(&records, &period1, &period2)?;
    println!("\n{}", output.report);

    if let Some(path) = args.get(7) {
        output.estimate.write_csv(path)?;
        println!("Estimate written to {}", path);
    }

    Ok(())
}
