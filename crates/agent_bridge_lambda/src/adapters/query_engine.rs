use agent_bridge_core::query::{
    ColumnInfo, Datum, QueryResultSet, QueryStatusReport, ResultRow, ResultSet, ResultSetMetadata,
};
use aws_sdk_athena::operation::get_query_results::GetQueryResultsOutput;
use aws_sdk_athena::types as athena;

/// Asynchronous SQL engine: submit, check, fetch.
pub trait QueryEngine {
    fn start_query(&self, query: &str, output_location: &str) -> Result<String, String>;

    fn query_status(&self, query_execution_id: &str) -> Result<QueryStatusReport, String>;

    fn query_results(&self, query_execution_id: &str) -> Result<QueryResultSet, String>;
}

/// Copies an Athena `GetQueryResults` response into the wire-shaped result
/// model, field for field.
pub fn result_set_from_sdk(output: &GetQueryResultsOutput) -> QueryResultSet {
    QueryResultSet {
        result_set: output.result_set().map(result_set).unwrap_or_default(),
        update_count: output.update_count(),
        next_token: output.next_token().map(str::to_string),
    }
}

fn result_set(result_set: &athena::ResultSet) -> ResultSet {
    ResultSet {
        rows: result_set
            .rows()
            .iter()
            .map(|row| ResultRow {
                data: row
                    .data()
                    .iter()
                    .map(|datum| Datum {
                        var_char_value: datum.var_char_value().map(str::to_string),
                    })
                    .collect(),
            })
            .collect(),
        result_set_metadata: result_set
            .result_set_metadata()
            .map(|metadata| ResultSetMetadata {
                column_info: metadata.column_info().iter().map(column_info).collect(),
            }),
    }
}

fn column_info(column: &athena::ColumnInfo) -> ColumnInfo {
    ColumnInfo {
        catalog_name: column.catalog_name().map(str::to_string),
        schema_name: column.schema_name().map(str::to_string),
        table_name: column.table_name().map(str::to_string),
        name: column.name().to_string(),
        label: column.label().map(str::to_string),
        column_type: column.r#type().to_string(),
        precision: column.precision(),
        scale: column.scale(),
        nullable: column
            .nullable()
            .map(|nullable| nullable.as_str().to_string()),
        case_sensitive: column.case_sensitive(),
    }
}
