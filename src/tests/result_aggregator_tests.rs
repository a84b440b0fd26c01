//! tests/result_aggregator_tests.rs
//! Resumen, reporte Excel y logs CSV por intento.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::tempdir;

    use crate::models::recipient_model::{Recipient, SendResult};
    use crate::models::report_model::RunSummary;
    use crate::services::attempt_log::{make_run_output_dir, AttemptLog};
    use crate::services::result_aggregator::{
        ResultAggregator, DETAIL_HEADERS, DETAIL_SHEET, SUMMARY_SHEET,
    };

    fn result(phone: &str, name: &str, error: Option<&str>) -> SendResult {
        let r = Recipient::test_new(phone, name, "");
        let message = format!("Hola {}", name).trim().to_string();
        SendResult::from_attempt(&r, message, error.map(str::to_string))
    }

    fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
        let mut wb = open_workbook_auto(path).expect("no se pudo abrir el reporte");
        let range = wb.worksheet_range(sheet).expect("hoja inexistente");
        range.rows().map(|r| r.to_vec()).collect()
    }

    fn as_text(cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Empty => String::new(),
            other => other.to_string(),
        }
    }

    #[test]
    fn test_summary_math() {
        let mut agg = ResultAggregator::new();
        for i in 0..10 {
            let err = if i < 7 { None } else { Some("chat did not load") };
            agg.add(result(&format!("9055500000{}", i), "X", err));
        }
        let s = agg.summary();
        assert_eq!((s.total, s.sent, s.failed), (10, 7, 3));
        assert_eq!(s.success_rate, 70.00);

        let empty = ResultAggregator::new().summary();
        assert_eq!(empty, RunSummary::from_counts(0, 0));
        assert_eq!(empty.success_rate, 0.00);

        assert_eq!(RunSummary::from_counts(1, 2).success_rate, 33.33);
        assert_eq!(RunSummary::from_counts(2, 1).success_rate, 66.67);
    }

    #[test]
    fn test_export_report_detail_and_summary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.xlsx");

        let mut agg = ResultAggregator::new();
        agg.add_with_timestamp(result("905551112233", "Ana", None), "2025-01-01 10:00:00".into());
        agg.add_with_timestamp(
            result("905554445566", "", Some("chat did not load (timeout after 20s)")),
            "2025-01-01 10:00:30".into(),
        );
        agg.export_report(&path).unwrap();

        let detail = read_sheet(&path, DETAIL_SHEET);
        assert_eq!(detail.len(), 3);
        let header: Vec<String> = detail[0].iter().map(as_text).collect();
        assert_eq!(header, DETAIL_HEADERS.to_vec());
        // Encabezados en minúscula, releíbles como archivo de contactos
        assert_eq!(
            header,
            vec!["phone", "name", "status", "timestamp", "final_message", "error"]
        );

        let first: Vec<String> = detail[1].iter().map(as_text).collect();
        assert_eq!(
            first,
            vec!["905551112233", "Ana", "Sent", "2025-01-01 10:00:00", "Hola Ana", ""]
        );
        let second: Vec<String> = detail[2].iter().map(as_text).collect();
        assert_eq!(second[2], "Failed");
        assert!(second[5].contains("chat did not load"));

        let summary = read_sheet(&path, SUMMARY_SHEET);
        assert_eq!(as_text(&summary[0][0]), "Metric");
        assert_eq!(as_text(&summary[4][0]), "SuccessRate(%)");
        assert_eq!(summary[1][1], Data::Float(2.0));
        assert_eq!(summary[2][1], Data::Float(1.0));
        assert_eq!(summary[3][1], Data::Float(1.0));
        assert_eq!(summary[4][1], Data::Float(50.0));
    }

    #[test]
    fn test_export_twice_same_detail_rows() {
        let dir = tempdir().unwrap();
        let mut agg = ResultAggregator::new();
        for (i, phone) in ["905551112233", "905552223344", "905553334455"].iter().enumerate() {
            let err = if i == 1 { Some("send control not found") } else { None };
            agg.add_with_timestamp(result(phone, "N", err), format!("2025-01-01 10:00:0{}", i));
        }

        let a = dir.path().join("a.xlsx");
        let b = dir.path().join("b.xlsx");
        agg.export_report(&a).unwrap();
        agg.export_report(&b).unwrap();

        let rows_a = read_sheet(&a, DETAIL_SHEET);
        let rows_b = read_sheet(&b, DETAIL_SHEET);
        assert_eq!(rows_a, rows_b);
        let phones: Vec<String> = rows_a[1..].iter().map(|r| as_text(&r[0])).collect();
        assert_eq!(phones, vec!["905551112233", "905552223344", "905553334455"]);
    }

    #[test]
    fn test_export_to_unwritable_path_keeps_results() {
        let dir = tempdir().unwrap();
        // Un archivo donde debería ir una carpeta
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let mut agg = ResultAggregator::new();
        agg.add(result("905551112233", "Ana", None));
        assert!(agg.export_report(&blocker.join("results.xlsx")).is_err());
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_run_output_dir_is_unique() {
        let root = tempdir().unwrap();
        let first = make_run_output_dir(root.path()).unwrap();
        let second = make_run_output_dir(root.path()).unwrap();
        assert!(first.is_dir());
        assert!(second.is_dir());
        assert_ne!(first, second);
    }

    #[test]
    fn test_attempt_log_headers_written_once() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::new(dir.path().join("sent_log.csv"), dir.path().join("failed_log.csv"));

        log.append(&result("905551112233", "Ana", None), "2025-01-01 10:00:00").unwrap();
        log.append(&result("905552223344", "Bob", None), "2025-01-01 10:00:10").unwrap();
        log.append(&result("905554445566", "", Some("invalid or non-user number")), "2025-01-01 10:00:20")
            .unwrap();

        let sent = fs::read_to_string(log.sent_path()).unwrap();
        let sent_lines: Vec<&str> = sent.lines().collect();
        assert_eq!(sent_lines[0], "timestamp,phone,name,message");
        assert_eq!(sent_lines.len(), 3);
        assert_eq!(sent_lines[1], "2025-01-01 10:00:00,905551112233,Ana,Hola Ana");

        let failed = fs::read_to_string(log.failed_path()).unwrap();
        let failed_lines: Vec<&str> = failed.lines().collect();
        assert_eq!(failed_lines[0], "timestamp,phone,name,message,error");
        assert_eq!(
            failed_lines[1],
            "2025-01-01 10:00:20,905554445566,,Hola,invalid or non-user number"
        );
    }
}
