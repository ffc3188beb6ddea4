use serde::{Deserialize, Serialize};

use super::{Analysis, AnalysisListItem};

pub const COMMON_DIAGNOSES_LIMIT: usize = 5;
pub const RECENT_ANALYSES_LIMIT: usize = 5;
/// Completed analyses scanned for diagnosis frequencies.
pub const STATS_WINDOW: usize = 100;
pub const FEEDBACK_ACCURACY: f64 = 0.85;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosisCount {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_analyses: i64,
    pub common_diagnoses: Vec<DiagnosisCount>,
    pub feedback_accuracy: f64,
    pub recent_analyses: Vec<AnalysisListItem>,
}

/// Most frequent consensus diagnoses, ties kept in first-seen order.
pub fn common_diagnoses(completed: &[Analysis]) -> Vec<DiagnosisCount> {
    let mut counts: Vec<DiagnosisCount> = Vec::new();
    for name in completed.iter().flat_map(Analysis::consensus_diagnosis_names) {
        match counts.iter_mut().find(|c| c.name == name) {
            Some(entry) => entry.count += 1,
            None => counts.push(DiagnosisCount { name, count: 1 }),
        }
    }
    // stable sort keeps first appearance among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(COMMON_DIAGNOSES_LIMIT);
    counts
}

/// Recent completed analyses first, topped up from the newest of the rest.
pub fn recent_analyses(completed: &[Analysis], newest: &[Analysis]) -> Vec<AnalysisListItem> {
    let mut picked: Vec<&Analysis> = completed.iter().take(RECENT_ANALYSES_LIMIT).collect();
    for analysis in newest {
        if picked.len() >= RECENT_ANALYSES_LIMIT {
            break;
        }
        if !picked.iter().any(|p| p.id == analysis.id) {
            picked.push(analysis);
        }
    }
    picked.into_iter().map(Analysis::to_list_item).collect()
}
