//! Release list rendering for `--list-only`.

use clap::ValueEnum;
use relmine_core::ReleaseDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
    Csv,
    Tags,
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render(releases: &[ReleaseDescriptor], format: ListFormat) -> anyhow::Result<String> {
    let out = match format {
        ListFormat::Json => serde_json::to_string_pretty(releases)?,
        ListFormat::Csv => {
            let mut out = String::from("tag_name,name,published_date,url");
            for r in releases {
                out.push('\n');
                out.push_str(&format!(
                    "{},{},{},{}",
                    csv_field(&r.tag),
                    csv_field(&r.name),
                    r.published_date,
                    csv_field(&r.url)
                ));
            }
            out
        }
        ListFormat::Tags => releases
            .iter()
            .map(|r| r.tag.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        ListFormat::Text => {
            let mut out = format!("Total releases: {}\n", releases.len());
            for (i, r) in releases.iter().enumerate() {
                out.push_str(&format!(
                    "\n{:2}. {:<20} - {} - {}",
                    i + 1,
                    r.tag,
                    r.published_date,
                    r.name
                ));
            }
            out
        }
    };
    Ok(out)
}
