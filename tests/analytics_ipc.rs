mod test_support;

use serde_json::json;
use test_support::{open_seeded_workspace, request_ok, spawn_sidecar};

#[test]
fn double_booking_is_reported_once_with_both_sections() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ws = open_seeded_workspace(&mut stdin, &mut reader, "timetabled-analytics-double");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "t",
        "teachers.upsert",
        json!({ "schoolId": "s1", "teacherId": "T", "name": "Ms T", "subjects": ["Math"] }),
    );
    for id in ["A", "B"] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("sec-{id}"),
            "sections.upsert",
            json!({ "schoolId": "s1", "sectionId": id, "grade": 7 }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("set-{id}"),
            "timetable.setCell",
            json!({ "sectionId": id, "weekday": 1, "periodNumber": 2, "subject": "Math", "teacherId": "T" }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        "analytics.conflicts",
        json!({ "schoolId": "s1" }),
    );
    let conflicts = result["conflicts"].as_array().expect("conflicts");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        result["summary"],
        json!({ "errors": 1, "warnings": 0, "infos": 0 })
    );
    let c = &conflicts[0];
    assert_eq!(c["conflictType"], "DoubleBooking");
    assert_eq!(c["severity"], "error");
    assert_eq!(
        c["affectedPeriods"],
        json!([
            { "teacherId": "T", "sectionId": "A", "weekday": 1, "periodNumber": 2 },
            { "teacherId": "T", "sectionId": "B", "weekday": 1, "periodNumber": 2 }
        ])
    );
}

#[test]
fn overload_and_load_report_share_thresholds() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ws = open_seeded_workspace(&mut stdin, &mut reader, "timetabled-analytics-load");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "teachers.upsert",
        json!({ "schoolId": "s1", "teacherId": "t1", "name": "Ada", "subjects": "Math", "maxPeriodsPerWeek": 4 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "t2",
        "teachers.upsert",
        json!({ "schoolId": "s1", "teacherId": "t2", "name": "Bo", "subjects": "Art" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "sec",
        "sections.upsert",
        json!({ "schoolId": "s1", "sectionId": "7A", "grade": 7 }),
    );
    let rows: Vec<serde_json::Value> = [1, 2, 3, 5, 6]
        .iter()
        .map(|p| json!({ "weekday": 1, "periodNumber": p, "subject": "Math", "teacherId": "t1" }))
        .collect();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "save",
        "timetable.save",
        json!({ "sectionId": "7A", "assignments": rows }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        "analytics.conflicts",
        json!({ "schoolId": "s1" }),
    );
    let c = &result["conflicts"][0];
    assert_eq!(c["conflictType"], "Overload");
    assert_eq!(c["severity"], "warning");

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "load",
        "analytics.teacherLoad",
        json!({ "schoolId": "s1" }),
    );
    let ada = &report["teachers"][0];
    assert_eq!(ada["totalPeriods"], 5);
    assert_eq!(ada["maxPeriods"], 4);
    assert_eq!(ada["loadPercentage"], 125);
    assert_eq!(ada["status"], "overloaded");
    assert_eq!(ada["subjectsTaught"], json!(["Math"]));
    let bo = &report["teachers"][1];
    assert_eq!(bo["maxPeriods"], 30);
    assert_eq!(bo["status"], "unassigned");
    assert_eq!(report["summary"]["overloadedCount"], 1);
    assert_eq!(report["summary"]["unassignedCount"], 1);
    assert_eq!(report["summary"]["averageLoadPercentage"], 62.5);

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "load2",
        "analytics.teacherLoad",
        json!({ "schoolId": "s1", "grade": 9 }),
    );
    assert_eq!(filtered["teachers"][0]["status"], "unassigned");
}
