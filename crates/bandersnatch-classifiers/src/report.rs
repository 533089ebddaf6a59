//! HTML fragments for the web front end.
//!
//! Tables carry bootstrap classes and no index column. Cell text is escaped.
use maud::{html, Markup};

use crate::data_handling::Dataset;
use crate::machine::ModelSummary;

const TABLE_CLASS: &str = "table table-striped";

/// Render the whole dataset as a table, or `None` when it has no rows.
pub fn dataset_table(dataset: &Dataset) -> Option<String> {
    if dataset.is_empty() {
        return None;
    }
    let markup: Markup = html! {
        table class=(TABLE_CLASS) {
            thead {
                tr {
                    @for column in dataset.columns() {
                        th { (column) }
                    }
                }
            }
            tbody {
                @for row in dataset.rows() {
                    tr {
                        @for cell in row {
                            td { (cell.to_string()) }
                        }
                    }
                }
            }
        }
    };
    Some(markup.into_string())
}

/// Two-column table describing a trained machine.
pub fn summary_table(summary: &ModelSummary) -> String {
    html! {
        table class=(TABLE_CLASS) {
            tbody {
                tr { th { "Classes" } td { (summary.classes.join(", ")) } }
                tr { th { "Features" } td { (summary.features.join(", ")) } }
                tr { th { "Feature count" } td { (summary.n_features) } }
                tr { th { "Validation accuracy" } td { (format!("{:.4}", summary.validation_accuracy)) } }
            }
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::Value;

    #[test]
    fn empty_dataset_has_no_table() {
        assert!(dataset_table(&Dataset::default()).is_none());
    }

    #[test]
    fn table_escapes_cells() {
        let ds = Dataset::from_records(vec![vec![
            ("Name", Value::from("<b>Jabberwock</b>")),
            ("Level", Value::Int(7)),
        ]]);
        let html = dataset_table(&ds).unwrap();
        assert!(html.starts_with(r#"<table class="table table-striped">"#));
        assert!(html.contains("<th>Name</th><th>Level</th>"));
        assert!(html.contains("&lt;b&gt;Jabberwock&lt;/b&gt;"));
        assert!(html.contains("<td>7</td>"));
    }

    #[test]
    fn summary_lists_classes() {
        let summary = ModelSummary {
            features: vec!["Level".into(), "Health".into()],
            n_features: 2,
            classes: vec!["Common".into(), "Rare".into()],
            validation_accuracy: 0.75,
        };
        let html = summary_table(&summary);
        assert!(html.contains("<td>Common, Rare</td>"));
        assert!(html.contains("<td>0.7500</td>"));
    }
}
