//! End-to-end imports against an in-memory store and a temporary imports dir

use member_import::{
    get_events_for_entity, Account, ArtifactLayout, Center, ImportError, ImportKind, ImportPipeline, ImportRequest, Member,
    MemberStore, Person, Profile, SideFileKind, SqliteStore, Stage, Status, DEFAULT_COLUMNS,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// CSV with the full person header; unspecified cells are empty
fn persons_csv(rows: &[&[(&str, &str)]]) -> String {
    let mut text = DEFAULT_COLUMNS.join(",");
    for row in rows {
        let cells: HashMap<&str, &str> = row.iter().copied().collect();
        let line: Vec<String> = DEFAULT_COLUMNS
            .iter()
            .map(|c| {
                let value = cells.get(c).copied().unwrap_or("");
                if value.contains(',') {
                    format!("\"{}\"", value)
                } else {
                    value.to_string()
                }
            })
            .collect();
        text.push('\n');
        text.push_str(&line.join(","));
    }
    text.push('\n');
    text
}

fn seed_email(store: &mut SqliteStore, center: &Center, email: &str) {
    let account = Account::new(email);
    let mut person = Person::new(&center.id, "Existing Member", "admin");
    person.account_id = Some(account.id.clone());
    store
        .insert_member(
            &Member {
                account,
                profile: Profile::default(),
                person,
                history: vec![],
            },
            "admin",
        )
        .unwrap();
}

fn pipeline(dir: &Path) -> ImportPipeline<SqliteStore> {
    ImportPipeline::new(SqliteStore::open_in_memory().unwrap(), ArtifactLayout::new(dir))
}

#[test]
fn test_three_row_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());
    seed_email(p.store_mut(), &center, "b@b.com");

    let text = persons_csv(&[
        &[("name", "Ana Maria Silva"), ("email", "a@a.com"), ("A1", "2020-01-01")],
        &[("name", "Bia Souza"), ("email", "")],
        &[("name", "Cid Alves"), ("email", "b@b.com")],
    ]);

    let outcome = p
        .run(ImportRequest::new(
            ImportKind::Persons,
            &text,
            "north_branch.csv",
            &center,
            "admin",
        ))
        .unwrap();

    assert_eq!(outcome.summary.entries, 3);
    assert_eq!(outcome.summary.get("IMPORTED"), Some(1));
    assert_eq!(outcome.summary.get("WITHOUT_EMAIL"), Some(1));
    assert_eq!(outcome.summary.get("USED_EMAIL"), Some(1));
    assert_eq!(outcome.summary.get("DUPLICATED"), Some(0));
    assert_eq!(outcome.summary.get("REJECTED"), Some(0));

    // seeded member + Ana
    assert_eq!(p.store().count_persons().unwrap(), 2);

    assert_eq!(
        outcome.report_path,
        dir.path().join("reports/persons/north_branch__report.txt")
    );
    let we = dir.path().join("persons/without_email/we__north_branch.csv");
    assert!(we.is_file());
    assert!(fs::read_to_string(&we).unwrap().contains("Bia Souza"));
    assert!(outcome.side_files.contains(&(SideFileKind::WithoutKey, we)));

    let lines = &outcome.report_lines;
    assert!(lines.iter().any(|l| l == "center:      North Branch"));
    assert!(lines.iter().any(|l| l == "- ENTRIES:         3"));
    assert!(lines.iter().any(|l| l == "  1 - Cid Alves (b@b.com)"));
}

#[test]
fn test_schema_gate_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let text = "name,email\nAna,a@a.com\n";
    let err = p
        .run(ImportRequest::new(ImportKind::Persons, text, "north_branch.csv", &center, "admin"))
        .unwrap_err();

    match err {
        ImportError::Schema(e) => {
            assert_eq!(e.file_name, "north_branch.csv");
            assert!(e.missing.contains(&"reg".to_string()));
            assert!(!e.missing.contains(&"email".to_string()));
        }
        other => panic!("expected schema error, got {other}"),
    }

    assert_eq!(p.store().count_persons().unwrap(), 0);
    assert_eq!(p.store().count_accounts().unwrap(), 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_occurrences_and_restriction() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let mut text = persons_csv(&[&[
        ("name", "Ana Maria Silva"),
        ("email", "a@a.com"),
        ("A1", "2020-01-01"),
        ("A3", "2021-06-15"),
        ("GR", "2019-03-01"),
        ("cpf", "111.444.777-35"),
        ("__full_address", "Rua A, 123, Apto 4"),
        ("phone", "+55 (11) 9 8888-7777"),
    ]]);
    // append restriction columns to the header and the single row
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines[0].push_str(",restriction,restriction_date");
    lines[1].push_str(",LIC,2023-01-01");
    text = lines.join("\n");

    let outcome = p
        .run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();
    assert_eq!(outcome.summary.get("IMPORTED"), Some(1));

    let person = p
        .store()
        .find_person_by_name(&center.id, "Ana Maria")
        .unwrap()
        .unwrap();
    assert_eq!(person.aspect.value, Some(Stage::A3));
    assert_eq!(person.status.value, Status::Licensed);
    assert_eq!(person.id_card, "111.444.777-35");
    assert_eq!(person.short_name, "Ana M. Silva");

    let history = p.store().person_history(&person.id).unwrap();
    assert_eq!(history.len(), 4);
}

#[test]
fn test_repeated_email_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let text = persons_csv(&[
        &[("name", "Ana"), ("email", "a@a.com")],
        &[("name", "Ana Twin"), ("email", " A@A.com ")],
    ]);

    let outcome = p
        .run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();

    assert_eq!(outcome.summary.get("IMPORTED"), Some(1));
    assert_eq!(outcome.summary.get("DUPLICATED"), Some(1));
    assert!(dir.path().join("persons/duplicated/de__north_branch.csv").is_file());
    assert_eq!(p.store().count_persons().unwrap(), 1);
}

#[test]
fn test_reimport_routes_everything_to_used_key() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());
    let text = persons_csv(&[&[("name", "Ana"), ("email", "a@a.com")]]);

    p.run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();
    assert!(p.layout().already_imported(ImportKind::Persons, "north_branch.csv"));

    let again = p
        .run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();

    assert_eq!(again.summary.get("IMPORTED"), Some(0));
    assert_eq!(again.summary.get("USED_EMAIL"), Some(1));
    assert_eq!(
        p.layout()
            .download_path(ImportKind::Persons, "ue", "north_branch.csv")
            .unwrap(),
        dir.path().join("persons/used_email/ue__north_branch.csv")
    );
    assert!(matches!(
        p.layout().download_path(ImportKind::Persons, "de", "north_branch.csv"),
        Err(ImportError::NotFound(_))
    ));
}

#[test]
fn test_field_update_after_import() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let text = persons_csv(&[&[("name", "Ana Maria Silva"), ("email", "a@a.com"), ("A1", "2020-01-01")]]);
    p.run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();

    let fields = "name,cpf,A2\nAna Maria,529.982.247-25,2022-02-02\nNobody,,\n";
    let outcome = p
        .run(ImportRequest::new(ImportKind::PersonFields, fields, "fields__north.csv", &center, "admin"))
        .unwrap();

    assert!(outcome.report_lines[0].contains("ADJUSTED FIELDS ON PERSON"));
    assert_eq!(outcome.summary.get("ADJUSTED"), Some(1));
    assert_eq!(outcome.summary.get("NOT_FOUND"), Some(1));
    assert!(dir.path().join("reports/fields/fields__north__report.txt").is_file());

    let person = p
        .store()
        .find_person_by_name(&center.id, "Ana Maria")
        .unwrap()
        .unwrap();
    assert_eq!(person.id_card, "529.982.247-25");
    assert_eq!(person.aspect.value, Some(Stage::A2));

    let mut events: Vec<String> = get_events_for_entity(p.store(), "person", &person.id)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    events.sort();
    assert_eq!(events, vec!["person_adjusted", "person_imported"]);
}

#[test]
fn test_field_update_records_probation_and_dated_restriction() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let text = persons_csv(&[&[("name", "Ana Maria Silva"), ("email", "a@a.com")]]);
    p.run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();

    let fields = "name,PRP,restriction,restriction_date\nAna Maria,2015-05-05,LIC,2023-01-01\n";
    let outcome = p
        .run(ImportRequest::new(ImportKind::PersonFields, fields, "fields__north.csv", &center, "admin"))
        .unwrap();
    assert_eq!(outcome.summary.get("ADJUSTED"), Some(1));
    assert_eq!(outcome.summary.get("REJECTED"), Some(0));

    let person = p
        .store()
        .find_person_by_name(&center.id, "Ana Maria")
        .unwrap()
        .unwrap();
    assert_eq!(person.aspect.value, Some(Stage::Preparatory));
    assert_eq!(person.status.value, Status::Licensed);
    assert_eq!(person.status.date.map(|d| d.to_string()), Some("2023-01-01".to_string()));

    let codes: Vec<&str> = p
        .store()
        .person_history(&person.id)
        .unwrap()
        .iter()
        .map(|h| h.occurrence.code())
        .collect();
    assert!(codes.contains(&"PRP"));
    assert!(codes.contains(&"LIC"));
}

#[test]
fn test_field_update_rejects_bad_occurrence_date() {
    let dir = tempfile::tempdir().unwrap();
    let center = Center::new("North Branch", "BR");
    let mut p = pipeline(dir.path());

    let text = persons_csv(&[&[("name", "Ana Maria Silva"), ("email", "a@a.com")]]);
    p.run(ImportRequest::new(ImportKind::Persons, &text, "north_branch.csv", &center, "admin"))
        .unwrap();

    let fields = "name,PRP\nAna Maria,sometime in 2015\n";
    let outcome = p
        .run(ImportRequest::new(ImportKind::PersonFields, fields, "fields__north.csv", &center, "admin"))
        .unwrap();

    assert_eq!(outcome.summary.get("REJECTED"), Some(1));
    assert_eq!(outcome.summary.get("ADJUSTED"), Some(0));

    let person = p
        .store()
        .find_person_by_name(&center.id, "Ana Maria")
        .unwrap()
        .unwrap();
    assert_eq!(person.aspect.value, None);
}
