//! Synthetic dataset generation. Every call draws fresh attributes, so trials over the
//! same configuration are not replays of each other.

use crate::dataset::{Document, IllnessCase, Tag};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::{f64::consts::PI, sync::Arc};

/// probability of each optional attribute being present
const OPTIONAL_PRESENCE: f64 = 0.7;

const FIRST_NAMES: [&str; 40] = [
    "Ada", "Alan", "Barbara", "Brian", "Carla", "Chen", "Dana", "David", "Elena", "Emil",
    "Fatima", "Felix", "Grace", "Gustav", "Hana", "Hugo", "Ines", "Ivan", "Julia", "Jonas",
    "Kara", "Karl", "Lena", "Luis", "Maria", "Milan", "Nadia", "Noah", "Olga", "Oscar",
    "Paula", "Pedro", "Rosa", "Rafael", "Sara", "Stefan", "Tara", "Tomas", "Vera", "Yusuf",
];

const LAST_NAMES: [&str; 24] = [
    "Adler", "Baker", "Costa", "Dimitrov", "Eriksson", "Fischer", "Garcia", "Hoffmann",
    "Ibrahim", "Jensen", "Kowalski", "Lindqvist", "Meyer", "Novak", "Okafor", "Petrov",
    "Quinn", "Rossi", "Schmidt", "Tanaka", "Usman", "Vogel", "Weber", "Zhang",
];

const CITIES: [&str; 8] = [
    "Berlin", "Lisbon", "Oslo", "Prague", "Vienna", "Zurich", "Madrid", "Dublin",
];
const COUNTRIES: [&str; 8] = [
    "Germany", "Portugal", "Norway", "Czechia", "Austria", "Switzerland", "Spain", "Ireland",
];
const STREETS: [&str; 6] = ["Main St", "Oak Ave", "Mill Rd", "Park Ln", "Church St", "High St"];
const DOMAINS: [&str; 4] = ["example.org", "example.com", "clinic.test", "health.test"];
const DIAGNOSES: [&str; 5] = ["COVID-19", "Flu", "Pneumonia", "Bronchitis", "Asthma"];
const SEVERITIES: [&str; 4] = ["Low", "Medium", "High", "Critical"];
const STATUSES: [&str; 4] = ["New", "In Progress", "Completed", "Closed"];
const DEPARTMENTS: [&str; 5] = ["Emergency", "ICU", "Surgery", "Cardiology", "Neurology"];
const PRIORITIES: [&str; 4] = ["Low", "Medium", "High", "Urgent"];
const CATEGORIES: [&str; 4] = ["Medical", "Administrative", "Billing", "Insurance"];
const SUBCATEGORIES: [&str; 4] = ["Type A", "Type B", "Type C", "Type D"];
const WORDS: [&str; 12] = [
    "patient", "reports", "stable", "condition", "follow", "up", "required", "after",
    "review", "of", "lab", "results",
];

#[derive(Debug)]
pub struct Generator {
    rng: StdRng,
}

impl Generator {
    /// seeded generators produce the same sequence of datasets
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    pub fn generate(&mut self, count: usize, docs_per_case: usize) -> Vec<IllnessCase> {
        let now = Utc::now();

        (0..count)
            .map(|_| {
                let illness_case_id: Arc<str> = Arc::from(self.uuid());
                let first_name: Arc<str> = Arc::from(*self.pick(&FIRST_NAMES));
                let last_name: Arc<str> = Arc::from(*self.pick(&LAST_NAMES));
                let tenant_id: Arc<str> = Arc::from(self.uuid());

                let documents = (0..self.document_count(docs_per_case))
                    .map(|_| Document {
                        document_id: self.uuid(),
                        created_by: self.email(),
                        created_at: self.past(now, 2 * 365),
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        illness_case_id: illness_case_id.clone(),
                        tenant_id: tenant_id.clone(),
                        published_at: self.past(now, 365),
                        optional: self.optional_tags(),
                    })
                    .collect();

                IllnessCase {
                    illness_case_id,
                    first_name,
                    last_name,
                    tenant_id,
                    documents,
                }
            })
            .collect()
    }

    /// normal distribution around `mean` with a 20% standard deviation, at least one
    fn document_count(&mut self, mean: usize) -> usize {
        let mean = mean as f64;
        // Box-Muller, `1 - gen()` keeps the logarithm finite
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();

        (mean + z0 * mean * 0.2).round().max(1.0) as usize
    }

    fn uuid(&mut self) -> String {
        uuid::Builder::from_random_bytes(self.rng.gen())
            .into_uuid()
            .hyphenated()
            .to_string()
    }

    fn pick<'a, T>(&mut self, values: &'a [T]) -> &'a T {
        // all pools are non-empty constants
        &values[self.rng.gen_range(0..values.len())]
    }

    fn past(&mut self, now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::milliseconds(self.rng.gen_range(0..days * 24 * 60 * 60 * 1000))
    }

    fn email(&mut self) -> String {
        format!(
            "{}.{}{}@{}",
            self.pick(&FIRST_NAMES).to_lowercase(),
            self.pick(&LAST_NAMES).to_lowercase(),
            self.rng.gen_range(1..1000),
            self.pick(&DOMAINS)
        )
    }

    fn sentence(&mut self) -> String {
        let length = self.rng.gen_range(4..9);
        let mut words = WORDS
            .choose_multiple(&mut self.rng, length)
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        words.push('.');

        words
    }

    fn optional_value(&mut self, tag: Tag) -> String {
        match tag {
            Tag::Email | Tag::AssignedTo => self.email(),
            Tag::PhoneNumber => format!(
                "+{} {:03} {:07}",
                self.rng.gen_range(1..99),
                self.rng.gen_range(0..1000),
                self.rng.gen_range(0..10_000_000)
            ),
            Tag::Address => format!(
                "{} {}",
                self.rng.gen_range(1..500),
                self.pick(&STREETS)
            ),
            Tag::City => self.pick(&CITIES).to_string(),
            Tag::Country => self.pick(&COUNTRIES).to_string(),
            Tag::ZipCode => format!("{:05}", self.rng.gen_range(0..100_000)),
            Tag::Diagnosis => self.pick(&DIAGNOSES).to_string(),
            Tag::Severity => self.pick(&SEVERITIES).to_string(),
            Tag::Status => self.pick(&STATUSES).to_string(),
            Tag::Department => self.pick(&DEPARTMENTS).to_string(),
            Tag::Priority => self.pick(&PRIORITIES).to_string(),
            Tag::Category => self.pick(&CATEGORIES).to_string(),
            Tag::Subcategory => self.pick(&SUBCATEGORIES).to_string(),
            Tag::Notes => self.sentence(),
            core => unreachable!("{} is not an optional attribute", core.key()),
        }
    }

    fn optional_tags(&mut self) -> Vec<(Tag, String)> {
        Tag::OPTIONAL
            .into_iter()
            .filter(|_| self.rng.gen_bool(OPTIONAL_PRESENCE))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|tag| (tag, self.optional_value(tag)))
            .collect()
    }

    /// shared randomness for sampling oracle values from a generated dataset
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
