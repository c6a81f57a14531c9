use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use stampdesk_core::domain::order::{Order, OrderLocation};
use stampdesk_core::domain::schema::FieldSchema;

use super::{OrderRepository, RepositoryError};

/// Append-only spreadsheet of orders. The header row holds the schema prompts
/// and is written only when the file is new or empty.
pub struct CsvOrderLedger {
    path: PathBuf,
    schema: FieldSchema,
    append_lock: Mutex<()>,
}

impl CsvOrderLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_schema(path, FieldSchema::order())
    }

    pub fn with_schema(path: impl Into<PathBuf>, schema: FieldSchema) -> Self {
        Self { path: path.into(), schema, append_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append(path: &Path, schema: &FieldSchema, row: &[String]) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(schema.prompts())?;
    }
    writer.write_record(row)?;
    writer.flush()?;
    Ok(())
}

#[async_trait::async_trait]
impl OrderRepository for CsvOrderLedger {
    async fn persist(&self, order: &Order) -> Result<OrderLocation, RepositoryError> {
        let _guard = self.append_lock.lock().await;
        let path = self.path.clone();
        let schema = self.schema;
        let row = order.row(&self.schema);
        tokio::task::spawn_blocking(move || append(&path, &schema, &row)).await??;
        debug!(
            event_name = "orders.ledger.appended",
            conversation_id = %order.conversation_id,
            path = %self.path.display(),
            "order appended to ledger"
        );
        Ok(OrderLocation(self.path.display().to_string()))
    }
}

/// Writes a complete orders sheet (prompt header plus one row per order).
pub fn write_orders_csv<W: Write>(
    writer: W,
    schema: &FieldSchema,
    orders: &[Order],
) -> Result<(), RepositoryError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(schema.prompts())?;
    for order in orders {
        writer.write_record(order.row(schema))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    use stampdesk_core::domain::schema::FieldSchema;
    use stampdesk_core::domain::session::{ConversationId, Session};
    use stampdesk_core::Order;

    use super::{write_orders_csv, CsvOrderLedger};
    use crate::repositories::OrderRepository;

    fn order(fields: &[(&str, &str)]) -> Order {
        let mut session = Session::new(ConversationId::from(9), Utc::now());
        session.merge_fields(fields.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));
        Order::from_session(&session, Utc::now())
    }

    fn read_records(path: &std::path::Path) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .expect("open ledger")
            .records()
            .map(|record| record.expect("record").iter().map(str::to_owned).collect())
            .collect()
    }

    #[tokio::test]
    async fn header_is_written_once_and_rows_follow_schema_order() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("orders.csv");
        let ledger = CsvOrderLedger::new(&path);

        let location =
            ledger.persist(&order(&[("phone", "555-1234"), ("name", "Ivan")])).await.expect("1");
        ledger.persist(&order(&[("name", "Anna"), ("urgency", "срочно")])).await.expect("2");

        assert_eq!(location.0, path.display().to_string());

        let records = read_records(&path);
        let schema = FieldSchema::order();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], schema.prompts().map(str::to_owned).collect::<Vec<_>>());
        assert_eq!(records[1][0], "Ivan");
        assert_eq!(records[1][1], "555-1234");
        assert_eq!(records[1][2], "");
        assert_eq!(records[2][0], "Anna");
        assert_eq!(records[2][schema.len() - 1], "срочно");
    }

    #[tokio::test]
    async fn reopening_an_existing_ledger_does_not_repeat_the_header() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("orders.csv");

        CsvOrderLedger::new(&path).persist(&order(&[("name", "Ivan")])).await.expect("first");
        CsvOrderLedger::new(&path).persist(&order(&[("name", "Oleg")])).await.expect("second");

        let records = read_records(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2][0], "Oleg");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_appends_keep_one_header_and_whole_rows() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("orders.csv");
        let ledger = Arc::new(CsvOrderLedger::new(&path));

        let mut tasks = JoinSet::new();
        for index in 0..8 {
            let ledger = ledger.clone();
            tasks.spawn(async move {
                let name = format!("customer-{index}");
                ledger.persist(&order(&[("name", name.as_str())])).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.expect("join").expect("persist");
        }

        let records = read_records(&path);
        assert_eq!(records.len(), 9);
        assert_eq!(records[0][0], "Как вас зовут?");
        let mut names: Vec<&str> = records[1..].iter().map(|record| record[0].as_str()).collect();
        names.sort_unstable();
        assert_eq!(names.len(), 8);
        assert!(names.iter().all(|name| name.starts_with("customer-")));
    }

    #[test]
    fn export_writes_header_even_without_orders() {
        let mut buffer = Vec::new();
        write_orders_csv(&mut buffer, &FieldSchema::order(), &[]).expect("export");

        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.starts_with("Как вас зовут?,Ваш номер телефона?"));
        assert_eq!(text.lines().count(), 1);
    }
}
