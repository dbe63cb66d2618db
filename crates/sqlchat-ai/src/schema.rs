//! Static table description embedded into every LLM prompt

/// A table description that contains NO actual data, only metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub table_name: String,

    /// Column metadata (names, types and descriptions only)
    pub columns: Vec<ColumnMeta>,
}

/// Column metadata (safe to send to LLM)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,

    /// PostgreSQL data type as written in the DDL
    pub data_type: String,

    /// What the column holds
    pub description: String,
}

impl ColumnMeta {
    fn new(name: &str, data_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            description: description.to_string(),
        }
    }
}

impl TableSchema {
    /// Render the columns in the line format the system prompt expects.
    pub fn table_info(&self) -> String {
        let mut out = String::from("\n");
        for c in &self.columns {
            out.push_str(&format!(
                "col_name: {}, dtype: {}, description: {}\n",
                c.name, c.data_type, c.description
            ));
        }
        out
    }
}

/// The visitor log table the service answers questions about.
pub fn egain_visitors() -> TableSchema {
    TableSchema {
        table_name: "egain_visitors".to_string(),
        columns: vec![
            ColumnMeta::new(
                "id",
                "serial",
                "The primary key of the table, increments automatically",
            ),
            ColumnMeta::new("ip_address", "text", "The IP address of the visitor"),
            ColumnMeta::new("org_name", "text", "The organization name of the visitor"),
            ColumnMeta::new("access_date", "date", "The date of the access by the visitor"),
            ColumnMeta::new("access_time", "time", "The time of the access by the visitor"),
            ColumnMeta::new(
                "request",
                "text",
                "The type of HTTP request made by the visitor",
            ),
            ColumnMeta::new(
                "page_url",
                "text",
                "The URL of the page visited by the visitor",
            ),
            ColumnMeta::new(
                "referral_url",
                "text",
                "The URL of the page that referred the visitor to the current page",
            ),
        ],
    }
}
