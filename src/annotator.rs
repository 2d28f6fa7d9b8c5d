use crate::document::{LiveDocument, Marker};
use crate::types::{BatchResultSet, Label};

pub fn label_color(label: &Label) -> &'static str {
    match label {
        Label::Phishing => "#ef4444",
        Label::Malware => "#f97316",
        Label::Defacement => "#8b5cf6",
        // never applied, SAFE links are not marked
        Label::Safe => "#22c55e",
        Label::Unknown | Label::Other(_) => "#eab308",
    }
}

pub fn marker_for(label: &Label) -> Marker {
    let color = label_color(label);
    Marker {
        color,
        background: format!("{}20", color),
        tooltip: format!("⚠️ {} link detected", label),
    }
}

// pure presentation over the document: marks every anchor matching a risky
// result, clears anchors the new generation classified as harmless.
// re-applying the same set is a no-op beyond redundant writes
pub fn apply(document: &LiveDocument, set: &BatchResultSet) {
    let mut marked = 0;
    let mut cleared = 0;
    for result in set.results() {
        if result.risky {
            marked += document.set_marker(&result.url, marker_for(&result.label));
        } else {
            cleared += document.clear_marker(&result.url);
        }
    }
    debug!("annotation applied: {} marked, {} cleared", marked, cleared);
}
