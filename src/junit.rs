use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::test::TestReport;
use crate::{TbError, TbResult};

pub fn create_junit_xml(suite: &str, reports: &[TestReport], path: &Path) -> TbResult<()> {
    let mut test_cases = Vec::new();

    for t in reports {
        let tc = match &t.result {
            Ok(_) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Err(e) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                e,
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| TbError::Junit(e.to_string()))?;
    log::info!("JUnit report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_passed_and_failed_cases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.xml");
        let reports = vec![
            TestReport {
                name: "good".to_string(),
                result: Ok("fine".to_string()),
                time_secs: 0.5,
                sim_time_ns: 10.0,
            },
            TestReport {
                name: "bad".to_string(),
                result: Err("scoreboard mismatch".to_string()),
                time_secs: 0.1,
                sim_time_ns: 4.0,
            },
        ];
        create_junit_xml("regbus_tb", &reports, &path).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("regbus_tb"));
        assert!(xml.contains("good"));
        assert!(xml.contains("scoreboard mismatch"));
    }
}
