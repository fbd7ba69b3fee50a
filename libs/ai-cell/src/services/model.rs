//! Multinomial naive Bayes over a normalised symptom vocabulary.
//!
//! Each condition keeps a count of how often every symptom was reported with
//! it. Likelihoods use Laplace smoothing so a symptom never seen with a
//! condition lowers its score without ruling it out.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{AiError, ConditionPrediction, TrainingSample};

const ALPHA: f64 = 1.0;

/// Built-in knowledge base the model starts from before any feedback.
const SEED_KNOWLEDGE: &[(&str, &[&str])] = &[
    ("common_cold", &["runny_nose", "sneezing", "sore_throat", "cough", "congestion", "mild_fever"]),
    ("influenza", &["fever", "chills", "muscle_aches", "fatigue", "cough", "headache", "sore_throat"]),
    ("covid_19", &["fever", "cough", "fatigue", "loss_of_taste", "loss_of_smell", "shortness_of_breath"]),
    ("migraine", &["headache", "nausea", "sensitivity_to_light", "sensitivity_to_sound", "blurred_vision"]),
    ("gastroenteritis", &["nausea", "vomiting", "diarrhea", "abdominal_pain", "fever"]),
    ("allergic_rhinitis", &["sneezing", "itchy_eyes", "runny_nose", "congestion", "watery_eyes"]),
    ("urinary_tract_infection", &["painful_urination", "frequent_urination", "lower_abdominal_pain", "cloudy_urine"]),
    ("type_2_diabetes", &["frequent_urination", "excessive_thirst", "fatigue", "blurred_vision", "slow_healing_wounds"]),
    ("asthma", &["shortness_of_breath", "wheezing", "chest_tightness", "cough"]),
    ("strep_throat", &["sore_throat", "fever", "swollen_lymph_nodes", "difficulty_swallowing"]),
    ("sinusitis", &["facial_pain", "congestion", "headache", "postnasal_drip", "cough"]),
    ("hypertension", &["headache", "dizziness", "blurred_vision", "nosebleeds"]),
];

/// Lowercase, trim and join internal whitespace with `_`.
pub fn normalize_symptom(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SymptomModel {
    condition_counts: BTreeMap<String, u64>,
    symptom_counts: BTreeMap<String, BTreeMap<String, u64>>,
    vocabulary: BTreeSet<String>,
    total_samples: u64,
}

impl SymptomModel {
    pub fn seeded() -> Self {
        let samples: Vec<TrainingSample> = SEED_KNOWLEDGE
            .iter()
            .map(|(condition, symptoms)| TrainingSample {
                condition: condition.to_string(),
                symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            })
            .collect();

        let mut model = Self::default();
        model.train(&samples);
        model
    }

    pub fn train(&mut self, samples: &[TrainingSample]) {
        for sample in samples {
            let condition = normalize_symptom(&sample.condition);
            if condition.is_empty() {
                continue;
            }
            let symptoms: BTreeSet<String> = sample.symptoms.iter()
                .map(|s| normalize_symptom(s))
                .filter(|s| !s.is_empty())
                .collect();
            if symptoms.is_empty() {
                continue;
            }

            *self.condition_counts.entry(condition.clone()).or_insert(0) += 1;
            let counts = self.symptom_counts.entry(condition).or_default();
            for symptom in symptoms {
                *counts.entry(symptom.clone()).or_insert(0) += 1;
                self.vocabulary.insert(symptom);
            }
            self.total_samples += 1;
        }
    }

    pub fn vocabulary(&self) -> Vec<String> {
        self.vocabulary.iter().cloned().collect()
    }

    pub fn conditions(&self) -> Vec<String> {
        self.condition_counts.keys().cloned().collect()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn knows(&self, symptom: &str) -> bool {
        self.vocabulary.contains(symptom)
    }

    /// Ranks conditions for the given symptoms. Unknown symptoms are ignored.
    pub fn predict(&self, symptoms: &[String], top_k: usize) -> Result<Vec<ConditionPrediction>, AiError> {
        let known: BTreeSet<String> = symptoms.iter()
            .map(|s| normalize_symptom(s))
            .filter(|s| self.knows(s))
            .collect();
        if known.is_empty() {
            return Err(AiError::NoKnownSymptoms);
        }

        let vocabulary_size = self.vocabulary.len() as f64;
        let total = self.total_samples as f64;

        let mut scored: Vec<(String, f64, Vec<String>)> = self.condition_counts.iter()
            .map(|(condition, &samples)| {
                let counts = self.symptom_counts.get(condition);
                let occurrences: u64 = counts.map(|c| c.values().sum()).unwrap_or(0);
                let denominator = occurrences as f64 + ALPHA * vocabulary_size;

                let mut log_score = (samples as f64 / total).ln();
                let mut matched = Vec::new();
                for symptom in &known {
                    let count = counts.and_then(|c| c.get(symptom)).copied().unwrap_or(0);
                    if count > 0 {
                        matched.push(symptom.clone());
                    }
                    log_score += ((count as f64 + ALPHA) / denominator).ln();
                }
                (condition.clone(), log_score, matched)
            })
            .collect();

        // Softmax over log scores, shifted by the max for stability.
        let max = scored.iter().map(|(_, s, _)| *s).fold(f64::NEG_INFINITY, f64::max);
        let norm: f64 = scored.iter().map(|(_, s, _)| (s - max).exp()).sum();
        for entry in scored.iter_mut() {
            entry.1 = (entry.1 - max).exp() / norm;
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(condition, probability, matched_symptoms)| ConditionPrediction {
                condition,
                probability,
                matched_symptoms,
            })
            .collect())
    }
}
