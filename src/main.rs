use harvest_stage::app::run_with_overrides;
use harvest_stage::cli::CliOverrides;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    match run_with_overrides(&cli) {
        Ok(summaries) => {
            for summary in summaries {
                let render = summary.render.map(|r| format!("{} nodes, {} visible", r.nodes, r.visible));
                log::info!(
                    "[summary] {:<16} frames={:<5} steps={:<5} last render: {}",
                    summary.name,
                    summary.ticks,
                    summary.fixed_steps,
                    render.as_deref().unwrap_or("never started")
                );
                for (event, count) in &summary.events {
                    log::info!("[summary] {:<16}   {event} x{count}", "");
                }
            }
        }
        Err(err) => {
            eprintln!("Application error: {err:?}");
            std::process::exit(1);
        }
    }
}
