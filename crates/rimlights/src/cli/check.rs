//! `check` subcommand: validate the config and show what it configures.

use rimlights_lib::frame::LedGroup;
use rimlights_lib::indicator::Indicator;

use super::{CheckOutput, Config, IndicatorJson, Options, Result, kv, kv_indent, kv_width, print_json};

fn indicator_json(ind: &Indicator) -> IndicatorJson {
    IndicatorJson {
        n: ind.position() + 1,
        path: ind.path().to_string(),
        value: ind.value().to_string(),
        total: ind.total().map(|t| t.to_string()),
        levels: ind.percentages().unwrap_or(ind.boundaries()).to_vec(),
        percent: ind.is_percent(),
        inverted: ind.inverted().to_vec(),
        colors: ind.colors().iter().map(|c| c.to_string()).collect(),
    }
}

fn describe(ind: &IndicatorJson) -> String {
    let levels: Vec<String> = ind
        .levels
        .iter()
        .map(|l| {
            if ind.percent {
                format!("{l}%")
            } else {
                format!("{l}")
            }
        })
        .collect();
    let mut s = format!(
        "{} >= [{}] -> {}",
        ind.value,
        levels.join(", "),
        ind.colors.join(", ")
    );
    if let Some(ref t) = ind.total {
        s.push_str(&format!(" (total {t})"));
    }
    if ind.inverted.iter().any(|&i| i) {
        s.push_str(" inverted");
    }
    s
}

pub(super) fn cmd_check(opts: &Options) -> Result<()> {
    let config_file = Config::find(opts.config.as_deref());
    let config = opts.load_config()?;
    let rpm: Vec<IndicatorJson> = config
        .indicators(LedGroup::Rpm)?
        .iter()
        .map(indicator_json)
        .collect();
    let buttons: Vec<IndicatorJson> = config
        .indicators(LedGroup::Buttons)?
        .iter()
        .map(indicator_json)
        .collect();
    let gate = config.session_gate()?;
    let session_gate = gate.active.is_some() || gate.paused.is_some();

    if opts.json {
        return print_json(&CheckOutput {
            config_file: config_file.map(|p| p.display().to_string()),
            telemetry_file: config.telemetry_file.display().to_string(),
            telemetry_size: config.telemetry_size,
            cycle_ms: config.cycle_ms,
            button_count: config.button_count,
            session_gate,
            rpm,
            buttons,
        });
    }

    let labels: Vec<String> = rpm
        .iter()
        .chain(&buttons)
        .map(|i| format!("LED {}:", i.n))
        .collect();
    let indent: Vec<&str> = labels.iter().map(String::as_str).collect();
    let w = kv_width(
        &["Config file:", "Telemetry:", "Cycle:", "Session gate:", "RPM strip:", "Buttons:"],
        &indent,
    );

    if let Some(p) = config_file {
        kv("Config file:", p.display(), w);
    }
    kv(
        "Telemetry:",
        format_args!(
            "{} ({} bytes)",
            config.telemetry_file.display(),
            config.telemetry_size
        ),
        w,
    );
    kv("Cycle:", format_args!("{} ms", config.cycle_ms), w);
    kv("Session gate:", if session_gate { "yes" } else { "no" }, w);
    println!();

    kv("RPM strip:", format_args!("{} indicator(s)", rpm.len()), w);
    for ind in &rpm {
        kv_indent(&format!("LED {}:", ind.n), describe(ind), w);
    }
    kv(
        "Buttons:",
        format_args!(
            "{} indicator(s), {} button(s)",
            buttons.len(),
            config.button_count
        ),
        w,
    );
    for ind in &buttons {
        kv_indent(&format!("LED {}:", ind.n), describe(ind), w);
    }
    println!();
    println!("Config OK.");
    Ok(())
}
