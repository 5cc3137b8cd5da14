//! Pronouncements and report sections.
//!
//! A [`Pronouncement`] is the immutable record of one validation run. A
//! [`Section`] composes up to three capabilities — narrative, data,
//! illustration — each optional; absent capabilities produce no output file
//! or directory when the section is saved.

use super::Verdict;
use crate::measurement::{Adapter, CollectError, Data, DataValue};
use crate::phenomenon::Phenomenon;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// The outcome of one comparison: what was compared, how, and the verdict.
/// Created once per comparison invocation, immutable thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct Pronouncement {
    pub phenomenon: Arc<Phenomenon>,
    pub reference_label: String,
    pub alternative_label: String,
    pub test: String,
    pub p_value: f64,
    pub verdict: Verdict,
    pub author: Option<String>,
    pub caption: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Pronouncement {
    pub fn new(
        phenomenon: Arc<Phenomenon>,
        reference_label: impl Into<String>,
        alternative_label: impl Into<String>,
        test: impl Into<String>,
        p_value: f64,
        verdict: Verdict,
    ) -> Self {
        Self {
            phenomenon,
            reference_label: reference_label.into(),
            alternative_label: alternative_label.into(),
            test: test.into(),
            p_value,
            verdict,
            author: None,
            caption: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass()
    }

    pub fn is_fail(&self) -> bool {
        self.verdict.is_fail()
    }
}

/// Figure sets for a report section: caption plus PNG bytes per
/// `(name, region)`. This crate only places the bytes; rendering them is a
/// collaborator's business.
#[derive(Debug, Clone, Default)]
pub struct Illustration {
    pub caption: String,
    pub figures: IndexMap<String, IndexMap<String, Vec<u8>>>,
}

impl Illustration {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            figures: IndexMap::new(),
        }
    }

    pub fn with_figure(
        mut self,
        name: impl Into<String>,
        region: impl Into<String>,
        png: Vec<u8>,
    ) -> Self {
        self.figures
            .entry(name.into())
            .or_default()
            .insert(region.into(), png);
        self
    }
}

/// A report section: a title plus any subset of the narrative, data, and
/// illustration capabilities.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: String,
    narrative: Option<String>,
    data: Data,
    illustration: Option<Illustration>,
    context: IndexMap<String, String>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            narrative: None,
            data: Data::none(),
            illustration: None,
            context: IndexMap::new(),
        }
    }

    /// Narrative template; `{key}` placeholders are substituted from the
    /// section context when the section is called.
    pub fn with_narrative(mut self, template: impl Into<String>) -> Self {
        self.narrative = Some(template.into());
        self
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub fn with_illustration(mut self, illustration: Illustration) -> Self {
        self.illustration = Some(illustration);
        self
    }

    /// Add a substitution for narrative placeholders.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Produce the section's content against an adapter and model.
    pub fn call<A, M>(&self, adapter: &A, model: &M) -> Result<SectionRecord, CollectError>
    where
        A: Adapter<M>,
    {
        Ok(SectionRecord {
            title: self.title.clone(),
            narrative: self
                .narrative
                .as_deref()
                .map(|template| substitute(template, &self.context)),
            data: self.data.collect(adapter, model)?,
            illustration: self.illustration.clone(),
        })
    }
}

/// The produced content of a section: each capability present iff it was
/// declared and yielded something.
#[derive(Debug, Clone)]
pub struct SectionRecord {
    pub title: String,
    pub narrative: Option<String>,
    pub data: Option<DataValue>,
    pub illustration: Option<Illustration>,
}

impl SectionRecord {
    /// Persist under `path`:
    /// `narrative.txt`, `data.csv` or `data/<name>.csv`, and
    /// `illustration/caption.txt` plus `illustration/<name>/<region>.png`.
    /// Absent content produces no file or directory at all.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(narrative) = &self.narrative {
            std::fs::create_dir_all(path)?;
            std::fs::write(path.join("narrative.txt"), narrative)?;
        }
        Data::save(self.data.as_ref(), path)?;
        if let Some(illustration) = &self.illustration {
            let root = path.join("illustration");
            std::fs::create_dir_all(&root)?;
            std::fs::write(root.join("caption.txt"), &illustration.caption)?;
            for (name, regions) in &illustration.figures {
                let directory = root.join(name);
                std::fs::create_dir_all(&directory)?;
                for (region, png) in regions {
                    std::fs::write(directory.join(format!("{region}.png")), png)?;
                }
            }
        }
        Ok(())
    }
}

/// Replace `{key}` placeholders from the context; unknown placeholders are
/// left as they are.
fn substitute(template: &str, context: &IndexMap<String, String>) -> String {
    let mut text = template.to_string();
    for (key, value) in context {
        text = text.replace(&format!("{{{key}}}"), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{AdapterError, MeasurementSource};
    use crate::parameter::Condition;
    use crate::phenomenon::PhenomenonRegistry;
    use crate::table::Table;
    use serde_json::{json, Value};

    struct MockAdapter;
    struct MockModel;

    impl Adapter<MockModel> for MockAdapter {
        fn sample(
            &self,
            _model: &MockModel,
            _phenomenon: &Phenomenon,
            _condition: &Condition,
        ) -> Result<Value, AdapterError> {
            Ok(json!(1.0))
        }
    }

    fn density_table() -> Table {
        Table::from_mapping(
            [
                ("layer".to_string(), json!(["L1", "L2", "L3"])),
                ("cell_density".to_string(), json!([10.0, 20.0, 30.0])),
            ]
            .into_iter()
            .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_substitute_replaces_known_placeholders() {
        let context: IndexMap<String, String> =
            [("phenomenon".to_string(), "cell density".to_string())]
                .into_iter()
                .collect();
        assert_eq!(
            substitute("We measured {phenomenon} in {region}.", &context),
            "We measured cell density in {region}."
        );
    }

    #[test]
    fn test_section_call_produces_narrative_and_data() {
        let section = Section::new("Cell density")
            .with_narrative("Test")
            .with_data(Data::single(MeasurementSource::Ready(density_table())));
        let record = section.call(&MockAdapter, &MockModel).unwrap();
        assert_eq!(record.narrative.as_deref(), Some("Test"));
        match &record.data {
            Some(DataValue::Single(table)) => {
                assert!(table.column_by_name("layer").is_some());
                assert!(table.column_by_name("cell_density").is_some());
            }
            other => panic!("unexpected data shape: {other:?}"),
        }
        assert!(record.illustration.is_none());
    }

    #[test]
    fn test_save_writes_narrative_and_data_only() {
        let dir = tempfile::tempdir().unwrap();
        let section = Section::new("Cell density")
            .with_narrative("Test")
            .with_data(Data::single(MeasurementSource::Ready(density_table())));
        let record = section.call(&MockAdapter, &MockModel).unwrap();
        record.save(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("narrative.txt")).unwrap(),
            "Test"
        );
        assert!(dir.path().join("data.csv").exists());
        assert!(!dir.path().join("illustration").exists());
    }

    #[test]
    fn test_save_empty_section_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("empty-section");
        let record = Section::new("Empty")
            .call(&MockAdapter, &MockModel)
            .unwrap();
        record.save(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_save_illustration_layout() {
        let dir = tempfile::tempdir().unwrap();
        let record = SectionRecord {
            title: "Figures".into(),
            narrative: None,
            data: None,
            illustration: Some(
                Illustration::new("Layer profiles")
                    .with_figure("cell_density", "SSp", vec![0x89, 0x50, 0x4e, 0x47]),
            ),
        };
        record.save(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("illustration/caption.txt")).unwrap(),
            "Layer profiles"
        );
        assert!(dir
            .path()
            .join("illustration/cell_density/SSp.png")
            .exists());
        assert!(!dir.path().join("narrative.txt").exists());
    }

    #[test]
    fn test_pronouncement_metadata() {
        let phenomenon = PhenomenonRegistry::new()
            .intern("Cell Density", "Number of cells per unit volume.");
        let pronouncement = Pronouncement::new(
            phenomenon,
            "DeFelipe 2017",
            "circuit-2024",
            "welch-t-test",
            0.4,
            Verdict::Pass,
        )
        .with_author("dmt")
        .with_caption("Layer-wise cell density validation");
        assert!(pronouncement.is_pass());
        assert_eq!(pronouncement.author.as_deref(), Some("dmt"));
        assert!(pronouncement.caption.as_deref().unwrap().contains("Layer"));
    }
}
