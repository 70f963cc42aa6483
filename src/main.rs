use anyhow::Result;
use uvdash_forecast::{CanonicalDataPoint, RefreshSnapshot, UV_CHART_MAX};

#[tokio::main]
async fn main() -> Result<()> {
    uvdash_core::init()?;

    let (config, _validation) = uvdash_core::Config::load_validated()?;
    let app = uvdash_core::App::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e))?;

    tracing::info!("UVDash started");
    println!("UVDash - hourly UV index");

    let mut now = app.now();
    print_snapshot(&app.snapshot(), *now.borrow());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = now.changed() => {
                if changed.is_err() {
                    break;
                }
                let at = *now.borrow_and_update();
                print_snapshot(&app.snapshot(), at);
            }
        }
    }

    app.shutdown().await;
    Ok(())
}

fn print_snapshot(snapshot: &RefreshSnapshot, now: chrono::DateTime<chrono::Utc>) {
    let local_now = now.with_timezone(&chrono::Local).naive_local();

    if snapshot.is_pending() {
        println!("[{}] {}: loading...", local_now.format("%H:%M"), snapshot.postal_code);
        return;
    }

    let mut line = format!(
        "[{}] {}: {} hourly readings",
        local_now.format("%H:%M"),
        snapshot.postal_code,
        snapshot.series.len()
    );
    if snapshot.is_outdated_location() {
        line.push_str(" (previous location)");
    }
    if let Some(current) = snapshot.series.at_hour(local_now) {
        line.push_str(&format!(
            ", now {:.0} ({}) {}",
            current.uv_value,
            current.level().description(),
            uv_bar(current)
        ));
    }
    if let Some(peak) = snapshot.series.peak() {
        line.push_str(&format!(
            ", peak {:.0} at {}",
            peak.uv_value,
            peak.date_time.format("%l %p")
        ));
    }
    if let (Some(boundary), Some(last)) =
        (snapshot.series.next_day_boundary(), snapshot.series.points().last())
    {
        if last.date_time >= boundary {
            line.push_str(", runs into tomorrow");
        }
    }
    if let Some(sun) = snapshot.current_sun_times() {
        line.push_str(&format!(
            ", sun {}-{}",
            sun.sunrise.with_timezone(&chrono::Local).format("%H:%M"),
            sun.sunset.with_timezone(&chrono::Local).format("%H:%M")
        ));
    }
    if let Some(updated) = snapshot.watermark.as_datetime() {
        line.push_str(&format!(
            ", updated {}",
            updated.with_timezone(&chrono::Local).format("%H:%M")
        ));
    }
    println!("{}", line);
}

/// Fixed-width bar for a reading, scaled to the chart's UV range
fn uv_bar(point: &CanonicalDataPoint) -> String {
    let width = UV_CHART_MAX as usize;
    let filled = point.chart_value().round() as usize;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(width - filled))
}
