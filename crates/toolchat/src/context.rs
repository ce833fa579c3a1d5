//! Grounding context: renders catalog records into the text block that is
//! prepended to every question.
//!
//! Each record becomes a "Tool Summary" block listing a fixed set of fields
//! in a fixed order ([`TOOL_FIELDS`]). Only the first `limit` records are
//! rendered. The block ends with the answering rules the model must follow.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::dataset::{Dataset, ToolRecord};

/// Shown in place of any field a record does not have.
pub const PLACEHOLDER: &str = "N/A";

/// The whole context when there is nothing to render.
pub const NO_DATA: &str = "I currently have no tool data available.";

/// What the model is told to say about tools it doesn't know.
pub const UNKNOWN_TOOL_REPLY: &str = "I don't have information about that tool";

/// Default bound on rendered records.
pub const DEFAULT_CONTEXT_LIMIT: usize = 500;

const PREAMBLE: &str = "You are a tool information assistant. Here are some tools I know about:\n\n";

/// Field keys read from each record, in rendering order.
pub const TOOL_FIELDS: &[&str] = &[
    "TLMS_TOOL_ID",
    "TLMS_PRC_PART",
    "TLMS_CHILD_PART_NO",
    "TLMS_CHILD_PART_CATEGORY",
    "TLMS_CHILD_PART_CATEGORY_DET",
    "TLMS_CHILD_PART_QTY",
    "TLMS_TOOL_STATUS",
    "TLMS_ACTIVE_FLAG",
    "TLMS_TOOL_OWNERSHIP",
    "TLMS_TOOL_OPERATION_NO",
    "TLMS_TOOL_HAS_TOOL_DET",
    "TLMS_MSIL_ASSET_NO",
    "TLMS_ASSET_NO_FLG",
    "TLMS_MSIL_DEFINED_TOOLLIFE",
    "TLMS_SYS_CAL_STROKE",
    "TLMS_SYS_CAL_STROKE_DT",
    "TLMS_DUPLICATE_SET_TOOLING",
    "TLMS_RETOOLING_STS",
    "TLMS_VEND_CODE",
    "TLMS_VENDOR_MAIL_ID",
    "TLMS_TOOL_VEND_DATE",
    "TLMS_TOOLS_APPROVED_DURING_RFQ",
    "TLMS_CLOSE_DATE",
    "TLMS_CREATED_BY",
    "TLMS_CREATED_ON",
];

/// Display value of `key`; absent and null fields render as [`PLACEHOLDER`].
fn field<'a>(record: &'a ToolRecord, key: &str) -> Cow<'a, str> {
    match record.get(key) {
        None | Some(Value::Null) => Cow::Borrowed(PLACEHOLDER),
        Some(Value::String(s)) => Cow::Borrowed(s),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

/// Render one record as a multi-line summary block.
pub fn render_record(record: &ToolRecord) -> String {
    let f = |key: &str| field(record, key);
    format!(
        "🔧 Tool Summary\n\
         Tool ID: {}\n\
         Part No: {}\n\
         Child Part No: {}\n\
         Category: {} ({})\n\
         Quantity: {}\n\
         Tool Status: {} ({})\n\
         Ownership Code: {}\n\
         Operation No: {}\n\
         Tool Has Detail: {}\n\
         Asset No: {} | Flag: {}\n\
         Defined Tool Life: {}\n\
         System Cal Stroke: {} (Date: {})\n\
         Duplicate Set Tooling: {}\n\
         Retooling Status: {}\n\
         Vendor Code: {} | Mail: {}\n\
         Tool Vend Date: {}\n\
         Approved During RFQ: {}\n\
         Close Date: {}\n\
         Created By: {} on {}\n",
        f("TLMS_TOOL_ID"),
        f("TLMS_PRC_PART"),
        f("TLMS_CHILD_PART_NO"),
        f("TLMS_CHILD_PART_CATEGORY"),
        f("TLMS_CHILD_PART_CATEGORY_DET"),
        f("TLMS_CHILD_PART_QTY"),
        f("TLMS_TOOL_STATUS"),
        f("TLMS_ACTIVE_FLAG"),
        f("TLMS_TOOL_OWNERSHIP"),
        f("TLMS_TOOL_OPERATION_NO"),
        f("TLMS_TOOL_HAS_TOOL_DET"),
        f("TLMS_MSIL_ASSET_NO"),
        f("TLMS_ASSET_NO_FLG"),
        f("TLMS_MSIL_DEFINED_TOOLLIFE"),
        f("TLMS_SYS_CAL_STROKE"),
        f("TLMS_SYS_CAL_STROKE_DT"),
        f("TLMS_DUPLICATE_SET_TOOLING"),
        f("TLMS_RETOOLING_STS"),
        f("TLMS_VEND_CODE"),
        f("TLMS_VENDOR_MAIL_ID"),
        f("TLMS_TOOL_VEND_DATE"),
        f("TLMS_TOOLS_APPROVED_DURING_RFQ"),
        f("TLMS_CLOSE_DATE"),
        f("TLMS_CREATED_BY"),
        f("TLMS_CREATED_ON"),
    )
}

/// Render the first `limit` records plus the answering rules.
///
/// Returns exactly [`NO_DATA`] when no record would be rendered.
pub fn build_context(dataset: &Dataset, limit: usize) -> String {
    let blocks: Vec<String> = dataset.tools.iter().take(limit).map(render_record).collect();
    if blocks.is_empty() {
        return NO_DATA.to_string();
    }
    format!(
        "{PREAMBLE}{}\n\n\
         Rules:\n\
         1. Only answer about these specific tools\n\
         2. For unknown tools, say '{UNKNOWN_TOOL_REPLY}'\n\
         3. Keep responses concise (1-3 sentences)",
        blocks.join("\n\n")
    )
}

/// Append the user's question to a context block.
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!("{context}\n\nQuestion: {question}")
}

#[derive(Debug)]
struct CachedContext {
    version: u64,
    text: Arc<str>,
}

/// [`build_context`] with a one-entry cache keyed on the dataset version.
///
/// Unversioned datasets (version 0, i.e. not adopted by a
/// [`DatasetStore`](crate::dataset::DatasetStore)) are always re-rendered.
#[derive(Debug)]
pub struct ContextBuilder {
    limit: usize,
    cache: Mutex<Option<CachedContext>>,
}

impl ContextBuilder {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            cache: Mutex::new(None),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Context block for `dataset`, rendered at most once per version.
    pub fn context_for(&self, dataset: &Dataset) -> Arc<str> {
        let version = dataset.version();
        if version == 0 {
            return build_context(dataset, self.limit).into();
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref cached) = *cache
            && cached.version == version
        {
            return cached.text.clone();
        }

        let text: Arc<str> = build_context(dataset, self.limit).into();
        debug!(
            "Rendered context for dataset version {version}: {} of {} tools, {} chars",
            dataset.len().min(self.limit),
            dataset.len(),
            text.len()
        );
        *cache = Some(CachedContext {
            version,
            text: text.clone(),
        });
        text
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetStore;
    use serde_json::json;

    fn record(value: Value) -> ToolRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    fn full_record(id: &str) -> ToolRecord {
        let mut map = ToolRecord::new();
        for key in TOOL_FIELDS {
            map.insert((*key).to_string(), json!(format!("{key}-{id}")));
        }
        map
    }

    #[test]
    fn empty_dataset_gives_sentinel() {
        assert_eq!(build_context(&Dataset::default(), 20), NO_DATA);
    }

    #[test]
    fn zero_limit_gives_sentinel() {
        let dataset = Dataset::new(vec![full_record("a")]);
        assert_eq!(build_context(&dataset, 0), NO_DATA);
    }

    #[test]
    fn renders_fields_in_template_order() {
        let rendered = render_record(&record(json!({
            "TLMS_TOOL_ID": "T-100",
            "TLMS_CHILD_PART_CATEGORY": "DIE",
            "TLMS_CHILD_PART_CATEGORY_DET": "Press die",
            "TLMS_CHILD_PART_QTY": 3,
            "TLMS_MSIL_ASSET_NO": "A-7",
            "TLMS_ASSET_NO_FLG": "Y",
            "TLMS_CREATED_BY": "jdoe",
            "TLMS_CREATED_ON": 1704067200000_i64,
        })));

        assert!(rendered.starts_with("🔧 Tool Summary\nTool ID: T-100\n"));
        assert!(rendered.contains("Category: DIE (Press die)\n"));
        assert!(rendered.contains("Quantity: 3\n"));
        assert!(rendered.contains("Asset No: A-7 | Flag: Y\n"));
        assert!(rendered.ends_with("Created By: jdoe on 1704067200000\n"));
    }

    #[test]
    fn missing_field_gets_placeholder_only_there() {
        let mut partial = full_record("x");
        partial.remove("TLMS_VEND_CODE");
        let rendered = render_record(&partial);

        assert!(rendered.contains("Vendor Code: N/A | Mail: TLMS_VENDOR_MAIL_ID-x\n"));
        assert_eq!(rendered.matches(PLACEHOLDER).count(), 1);
    }

    #[test]
    fn null_field_gets_placeholder() {
        let rendered = render_record(&record(json!({"TLMS_TOOL_ID": null})));
        assert!(rendered.contains("Tool ID: N/A\n"));
        assert_eq!(rendered.matches(PLACEHOLDER).count(), 25);
    }

    #[test]
    fn scalar_fields_render_as_json_text() {
        let rendered = render_record(&record(json!({
            "TLMS_TOOL_HAS_TOOL_DET": true,
            "TLMS_ASSET_NO_FLG": false,
            "TLMS_MSIL_DEFINED_TOOLLIFE": 150000.5,
        })));
        assert!(rendered.contains("Tool Has Detail: true\n"));
        assert!(rendered.contains("Flag: false\n"));
        assert!(rendered.contains("Defined Tool Life: 150000.5\n"));
    }

    #[test]
    fn bound_keeps_prefix_in_order() {
        let tools = (0..30)
            .map(|i| record(json!({"TLMS_TOOL_ID": format!("T-{i:02}")})))
            .collect();
        let context = build_context(&Dataset::new(tools), 20);

        assert_eq!(context.matches("🔧 Tool Summary").count(), 20);
        assert!(context.contains("Tool ID: T-19\n"));
        assert!(!context.contains("Tool ID: T-20\n"));
        let first = context.find("Tool ID: T-00").unwrap();
        let last = context.find("Tool ID: T-19").unwrap();
        assert!(first < last);
    }

    #[test]
    fn context_has_preamble_and_rules() {
        let context = build_context(&Dataset::new(vec![full_record("a")]), 5);
        assert!(context.starts_with(PREAMBLE));
        assert!(context.ends_with("3. Keep responses concise (1-3 sentences)"));
        assert!(context.contains("say 'I don't have information about that tool'"));
    }

    #[test]
    fn prompt_appends_question() {
        assert_eq!(compose_prompt("CTX", "Where is T-1?"), "CTX\n\nQuestion: Where is T-1?");
    }

    #[test]
    fn builder_caches_per_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::open(dir.path().join("tools.json"));
        let builder = ContextBuilder::new(10);

        let first = builder.context_for(&store.snapshot());
        let again = builder.context_for(&store.snapshot());
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(&*first, NO_DATA);

        assert!(store.replace(json!({"tools": [{"TLMS_TOOL_ID": "T-5"}]})));
        let updated = builder.context_for(&store.snapshot());
        assert!(updated.contains("Tool ID: T-5"));
    }
}
