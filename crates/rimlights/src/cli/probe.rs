//! `probe` subcommand: read the wheel's current LED state.

use rimlights_lib::dispatch::{read_color, read_mode};
use rimlights_lib::frame::LedGroup;

use super::{
    ButtonColorJson, Config, ProbeOutput, Result, kv, kv_indent, kv_width, open_wheel,
    print_json, transport_for,
};

pub(super) fn cmd_probe(config: &Config, json: bool) -> Result<()> {
    let channel = open_wheel(config)?;
    let port = channel.path().to_string();
    let mut transport = transport_for(config, channel);

    let mode = read_mode(&mut transport, LedGroup::Rpm)?;
    let buttons = (0..config.button_count)
        .map(|i| {
            read_color(&mut transport, LedGroup::Buttons, i).map(|c| ButtonColorJson {
                n: i + 1,
                color: c.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        return print_json(&ProbeOutput {
            port,
            rpm_mode: format!("{mode:?}"),
            buttons,
        });
    }

    let labels: Vec<String> = buttons.iter().map(|b| format!("Button {}:", b.n)).collect();
    let indent: Vec<&str> = labels.iter().map(String::as_str).collect();
    let w = kv_width(&["Port:", "RPM mode:", "Button colors:"], &indent);

    kv("Port:", &port, w);
    kv("RPM mode:", format_args!("{mode:?}"), w);
    kv("Button colors:", "", w);
    for (label, b) in labels.iter().zip(&buttons) {
        kv_indent(label, &b.color, w);
    }
    Ok(())
}
