//! Per-frame aggregation of detections into a display-ready summary.
//!
//! A summary is rebuilt from scratch for every frame or image; nothing is
//! carried over between calls.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::detect::Detection;

/// Aggregate for one class.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    pub class_id: usize,
    pub name: String,
    pub count: usize,
    pub average_confidence: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    /// One row per known class, in order of first occurrence.
    pub rows: Vec<SummaryRow>,
    /// Every detection, including those whose class has no name.
    pub total: usize,
    /// Detections excluded from `rows` because their class is out of range.
    pub unlabeled: usize,
}

/// Group detections by class, computing count and mean confidence.
///
/// Classes without an entry in `class_names` get no row but still count toward
/// `total`.
pub fn summarize<S: AsRef<str>>(detections: &[Detection], class_names: &[S]) -> Summary {
    let mut groups: IndexMap<usize, (usize, f32)> = IndexMap::new();
    for det in detections {
        let entry = groups.entry(det.class_id).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += det.confidence;
    }

    let mut unlabeled = 0;
    let mut rows = Vec::with_capacity(groups.len());
    for (class_id, (count, confidence_sum)) in groups {
        let Some(name) = class_names.get(class_id) else {
            unlabeled += count;
            continue;
        };
        rows.push(SummaryRow {
            class_id,
            name: name.as_ref().to_string(),
            count,
            average_confidence: confidence_sum / count as f32,
        });
    }

    Summary {
        rows,
        total: detections.len(),
        unlabeled,
    }
}

impl Summary {
    /// True when nothing was detected at all, labeled or not.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn row(&self, class_id: usize) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.class_id == class_id)
    }

    /// Render the results panel as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut html = String::from(concat!(
            "<h3>Live detection report</h3>\n",
            "<table style=\"width:100%\">\n",
            "<tr><th align=\"left\">Behavior</th><th align=\"center\">Count</th>",
            "<th align=\"right\">Avg. confidence</th></tr>\n",
            "<tr><td colspan=\"3\"><hr></td></tr>\n",
        ));
        if self.is_empty() {
            html.push_str(
                "<tr><td colspan=\"3\" align=\"center\">No targets detected</td></tr>\n",
            );
        } else {
            for row in &self.rows {
                html.push_str(&format!(
                    "<tr><td>{}</td><td align=\"center\">{}</td><td align=\"right\">{:.2}</td></tr>\n",
                    escape_html(&row.name),
                    row.count,
                    row.average_confidence
                ));
            }
            html.push_str("<tr><td colspan=\"3\"><hr></td></tr>\n");
            html.push_str(&format!(
                "<tr><td><b>Total</b></td><td align=\"center\"><b>{}</b></td><td></td></tr>\n",
                self.total
            ));
        }
        html.push_str("</table>\n");
        html
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no targets detected");
        }
        writeln!(f, "{:<16} {:>6} {:>8}", "behavior", "count", "avg conf")?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<16} {:>6} {:>8.2}",
                row.name, row.count, row.average_confidence
            )?;
        }
        write!(f, "{:<16} {:>6}", "total", self.total)?;
        if self.unlabeled > 0 {
            write!(f, " ({} unlabeled)", self.unlabeled)?;
        }
        writeln!(f)
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
