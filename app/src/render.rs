use docent_core::files::DocumentRecord;
use docent_core::state::{ChatTurn, Speaker};
use docent_core::{SummaryEnvelope, UserProfile};
use serde_json::Value;

pub fn speaker_badge(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "You",
        Speaker::Assistant => "Docent",
    }
}

pub fn turn_line(turn: &ChatTurn) -> String {
    format!("{}: {}", speaker_badge(turn.speaker), turn.text)
}

pub fn profile_line(profile: &UserProfile) -> String {
    format!("Signed in as {} <{}> (id {})", profile.name, profile.email, profile.id)
}

pub fn document_line(record: &DocumentRecord) -> String {
    let status = serde_json::to_value(&record.status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    let uploaded = record.upload_date.as_deref().unwrap_or("-");
    format!("{}  {}  [{}]  {}", record.id, record.name, status, uploaded)
}

/// Renders summary points one per line; non-list content is pretty-printed.
pub fn summary_block(summary: &SummaryEnvelope) -> String {
    let mut out = format!(
        "{} for {} ({} items)\n",
        summary.title, summary.id, summary.word_count
    );
    let points = match &summary.content {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("summary").and_then(Value::as_array),
        _ => None,
    };
    match points {
        Some(items) => {
            for item in items {
                let text = item
                    .as_str()
                    .map(str::to_owned)
                    .unwrap_or_else(|| item.to_string());
                out.push_str(&format!("  - {text}\n"));
            }
        }
        None => {
            let pretty = serde_json::to_string_pretty(&summary.content).unwrap_or_default();
            out.push_str(&pretty);
            out.push('\n');
        }
    }
    out
}
