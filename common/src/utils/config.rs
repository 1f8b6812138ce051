use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Which files are handed to the answering service as its corpus.
#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorpusLayout {
    /// One JSON document per entity and category.
    #[default]
    Partitioned,
    /// Each source table exported as a single JSON array.
    FlatJson,
    /// Each source table exported as comma separated plain text.
    FlatText,
}

/// A source table declared by the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceTable {
    pub category: String,
    pub path: PathBuf,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_partition_output_dir")]
    pub partition_output_dir: String,
    #[serde(default = "default_partition_categories")]
    pub partition_categories: Vec<String>,
    #[serde(default = "default_source_file_template")]
    pub source_file_template: String,
    #[serde(default = "default_entity_field")]
    pub entity_field: String,
    #[serde(default = "default_true")]
    pub partition_on_startup: bool,
    #[serde(default)]
    pub corpus_layout: CorpusLayout,
    #[serde(default = "default_corpus_mime_type")]
    pub corpus_mime_type: String,
    #[serde(default = "default_corpus_store_name")]
    pub corpus_store_name: String,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    #[serde(default = "default_assistant_instructions")]
    pub assistant_instructions: String,
    #[serde(default = "default_assistant_model")]
    pub assistant_model: String,
    #[serde(default = "default_answer_poll_interval_ms")]
    pub answer_poll_interval_ms: u64,
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
    #[serde(default = "default_corpus_poll_interval_ms")]
    pub corpus_poll_interval_ms: u64,
    #[serde(default = "default_corpus_timeout_secs")]
    pub corpus_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_source_dir() -> String {
    "./data/sources".to_string()
}

fn default_partition_output_dir() -> String {
    "./data/partitioned".to_string()
}

fn default_partition_categories() -> Vec<String> {
    vec![
        "Confirmed".to_string(),
        "Deaths".to_string(),
        "Recovered".to_string(),
    ]
}

fn default_source_file_template() -> String {
    "time_series_covid19_{category}_global.csv".to_string()
}

fn default_entity_field() -> String {
    "Country/Region".to_string()
}

fn default_true() -> bool {
    true
}

fn default_corpus_mime_type() -> String {
    "text/plain".to_string()
}

fn default_corpus_store_name() -> String {
    "CovidInfoStore".to_string()
}

fn default_assistant_name() -> String {
    "Covid Agent".to_string()
}

fn default_assistant_instructions() -> String {
    "You are an expert in COVID-19 pandemic data. Use your knowledge base to answer queries."
        .to_string()
}

fn default_assistant_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_answer_poll_interval_ms() -> u64 {
    500
}

fn default_answer_timeout_secs() -> u64 {
    120
}

fn default_corpus_poll_interval_ms() -> u64 {
    1_000
}

fn default_corpus_timeout_secs() -> u64 {
    600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            source_dir: default_source_dir(),
            partition_output_dir: default_partition_output_dir(),
            partition_categories: default_partition_categories(),
            source_file_template: default_source_file_template(),
            entity_field: default_entity_field(),
            partition_on_startup: true,
            corpus_layout: CorpusLayout::default(),
            corpus_mime_type: default_corpus_mime_type(),
            corpus_store_name: default_corpus_store_name(),
            assistant_name: default_assistant_name(),
            assistant_instructions: default_assistant_instructions(),
            assistant_model: default_assistant_model(),
            answer_poll_interval_ms: default_answer_poll_interval_ms(),
            answer_timeout_secs: default_answer_timeout_secs(),
            corpus_poll_interval_ms: default_corpus_poll_interval_ms(),
            corpus_timeout_secs: default_corpus_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Source tables for every configured category, in category order.
    ///
    /// The file name comes from `source_file_template` with `{category}`
    /// replaced by the lowercase category label.
    pub fn source_tables(&self) -> Vec<SourceTable> {
        let source_dir = PathBuf::from(&self.source_dir);
        self.partition_categories
            .iter()
            .map(|category| SourceTable {
                category: category.clone(),
                path: source_dir.join(
                    self.source_file_template
                        .replace("{category}", &category.to_lowercase()),
                ),
            })
            .collect()
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("partition_categories"),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tables_follow_template() {
        let config = AppConfig {
            source_dir: "/srv/covid".into(),
            partition_categories: vec!["Confirmed".into(), "Deaths".into()],
            ..Default::default()
        };

        let tables = config.source_tables();
        assert_eq!(
            tables,
            vec![
                SourceTable {
                    category: "Confirmed".into(),
                    path: PathBuf::from("/srv/covid/time_series_covid19_confirmed_global.csv"),
                },
                SourceTable {
                    category: "Deaths".into(),
                    path: PathBuf::from("/srv/covid/time_series_covid19_deaths_global.csv"),
                },
            ]
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.answer_poll_interval_ms, 500);
        assert_eq!(config.entity_field, "Country/Region");
        assert_eq!(config.corpus_layout, CorpusLayout::Partitioned);
        assert_eq!(config.partition_categories.len(), 3);
    }

    #[test]
    fn corpus_layout_deserializes_from_snake_case() {
        let layout: CorpusLayout =
            serde_json::from_str("\"flat_json\"").expect("layout should parse");
        assert_eq!(layout, CorpusLayout::FlatJson);
    }
}
