//! End-to-end canonicalization against the bundled configuration.
//!
//! Covers the documented fragment/record/table scenarios, cross-domain
//! override behavior, and a full CSV -> tables -> loader batch run.

use std::io::Write;

use clinical_canon::canon::{RecordResolver, Resolution, Stage, TermResolver};
use clinical_canon::config::{Blocklist, CanonConfig, DomainConfig};
use clinical_canon::dimension::{write_domain_tables, DimensionBuilder, ResolvedRecord};
use clinical_canon::ingest::read_records;
use clinical_canon::pipeline::Pipeline;
use clinical_canon::Record;

fn builtin() -> CanonConfig {
    CanonConfig::builtin().expect("bundled config is valid")
}

fn resolver<'a>(config: &'a CanonConfig, domain: &str) -> TermResolver<'a> {
    TermResolver::for_domain(config.domain(domain).unwrap())
}

// =============================================================================
// FRAGMENTS
// =============================================================================

#[test]
fn test_numbered_fragment_resolves() {
    let config = builtin();
    let symptoms = resolver(&config, "symptoms");

    let record = Record::new(1).with_field("sintomas", Some("01 - Febre;"));
    let terms = RecordResolver::new(config.domain("symptoms").unwrap()).resolve_record(&record);

    assert_eq!(terms.iter().collect::<Vec<_>>(), vec!["Febre"]);
    assert_eq!(symptoms.resolve("Febre"), Some("Febre"));
}

#[test]
fn test_head_pain_fragment() {
    let config = builtin();
    assert_eq!(
        resolver(&config, "symptoms").resolve("dor de cabeca intensa"),
        Some("Dor De Cabeca")
    );
}

#[test]
fn test_head_pain_compound_without_overrides() {
    let config = builtin();
    let symptoms = config.domain("symptoms").unwrap();
    let blocklist = Blocklist::default();
    let bare = TermResolver::new(&symptoms.vocabulary, &[], &blocklist);

    let resolution = bare.explain("sentia dor forte na cabeca");
    assert_eq!(resolution.stage(), Stage::PainCompound);
    assert_eq!(resolution.term(), Some("Dor De Cabeca"));
}

#[test]
fn test_lab_noise_blocked() {
    let config = builtin();
    for domain in ["symptoms", "conditions"] {
        assert!(matches!(
            resolver(&config, domain).explain("exame covid positivo"),
            Resolution::Blocked { .. }
        ));
    }
}

#[test]
fn test_accent_and_case_insensitive() {
    let config = builtin();
    let symptoms = resolver(&config, "symptoms");
    assert_eq!(symptoms.resolve("CANSAÇO"), Some("Fadiga"));
    assert_eq!(symptoms.resolve("  Náusea "), Some("Nausea"));
    assert_eq!(symptoms.resolve("vômito"), Some("Vomito"));
}

#[test]
fn test_suppressed_conditions() {
    let config = builtin();
    let conditions = resolver(&config, "conditions");
    assert_eq!(conditions.resolve("alergia a dipirona"), None);
    assert_eq!(conditions.resolve("fratura de femur"), None);
}

// =============================================================================
// CROSS-DOMAIN OVERRIDES
// =============================================================================

#[test]
fn test_condition_override_does_not_leak_into_symptoms() {
    let config = builtin();

    assert_eq!(resolver(&config, "conditions").resolve("pressao"), Some("Hipertensao"));
    assert_eq!(resolver(&config, "symptoms").resolve("pressao"), None);
}

#[test]
fn test_symptom_override_does_not_leak_into_conditions() {
    let config = builtin();

    assert_eq!(resolver(&config, "symptoms").resolve("febril"), Some("Febre"));
    assert_eq!(resolver(&config, "conditions").resolve("febril"), None);
}

#[test]
fn test_every_canonical_term_resolves_to_itself() {
    let config = builtin();
    for domain in config.domains() {
        let resolver = TermResolver::for_domain(domain);
        for term in domain.vocabulary.terms() {
            assert_eq!(
                resolver.resolve(term),
                Some(term),
                "{} term '{}' did not resolve to itself",
                domain.name,
                term
            );
        }
    }
}

// =============================================================================
// RECORDS AND TABLES
// =============================================================================

#[test]
fn test_record_unions_primary_and_secondary() {
    let config = builtin();
    let record = Record::new(1)
        .with_field("sintomas", Some("Febre, Tosse"))
        .with_field("outrosSintomas", Some("Cansaco"));

    let terms = RecordResolver::new(config.domain("symptoms").unwrap()).resolve_record(&record);
    assert_eq!(
        terms.iter().collect::<Vec<_>>(),
        vec!["Fadiga", "Febre", "Tosse"]
    );
}

#[test]
fn test_dimension_and_bridge_from_two_records() {
    let config = builtin();
    let symptoms = config.domain("symptoms").unwrap();
    let resolver = RecordResolver::new(symptoms);

    let resolved: Vec<ResolvedRecord> = [
        Record::new(1).with_field("sintomas", Some("Febre, Tosse")),
        Record::new(2).with_field("sintomas", Some("Tosse; cansaço")),
    ]
    .iter()
    .map(|r| ResolvedRecord {
        record_id: r.id,
        terms: resolver.resolve_record(r),
    })
    .collect();

    let (dimension, bridge) = DimensionBuilder::new(symptoms).build(&resolved).unwrap();

    let rows: Vec<(i64, &str)> = dimension
        .rows()
        .iter()
        .map(|r| (r.id, r.name.as_str()))
        .collect();
    assert_eq!(rows, vec![(1, "Fadiga"), (2, "Febre"), (3, "Tosse")]);

    let fadiga = dimension.id_of("Fadiga").unwrap();
    let febre = dimension.id_of("Febre").unwrap();
    let tosse = dimension.id_of("Tosse").unwrap();
    assert_eq!(bridge.len(), 4);
    assert!(bridge.contains(1, febre));
    assert!(bridge.contains(1, tosse));
    assert!(bridge.contains(2, tosse));
    assert!(bridge.contains(2, fadiga));
}

#[test]
fn test_conditions_fall_back_to_comorbidades_column() {
    let config = builtin();
    let conditions: &DomainConfig = config.domain("conditions").unwrap();
    let record = Record::new(9)
        .with_field("comorbidades", Some("diabetes; asma"))
        .with_field("outrasCondicoes", Some("gravida"));

    let terms = RecordResolver::new(conditions).resolve_record(&record);
    assert_eq!(
        terms.iter().collect::<Vec<_>>(),
        vec!["Asma", "Diabetes", "Gestante"]
    );
}

// =============================================================================
// FULL RUN
// =============================================================================

#[test]
fn test_csv_to_loader_batches() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notificacoes.csv");
    let mut file = std::fs::File::create(&input).unwrap();
    writeln!(file, "sintomas,outrosSintomas,condicoes,outrasCondicoes").unwrap();
    writeln!(file, "\"Febre, Tosse\",Cansaco,Diabetes,").unwrap();
    writeln!(file, "\"Tosse, exame covid positivo\",nan,,pressao").unwrap();
    writeln!(file, "Assintomático,,,").unwrap();
    drop(file);

    let config = builtin();
    let records = read_records(&input).unwrap();
    let tables = Pipeline::new(&config).with_batch_size(2).run(&records).unwrap();

    let symptoms = tables.iter().find(|t| t.domain == "symptoms").unwrap();
    let names: Vec<&str> = symptoms
        .dimension
        .rows()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["Assintomatico", "Fadiga", "Febre", "Tosse"]);
    assert_eq!(symptoms.bridge.len(), 5);
    assert_eq!(symptoms.stats.records, 3);
    assert_eq!(symptoms.stats.fragments.get(Stage::Blocked), 1);

    let conditions = tables.iter().find(|t| t.domain == "conditions").unwrap();
    assert_eq!(conditions.dimension.len(), 2);
    assert_eq!(conditions.stats.records_with_terms, 2);

    let out = dir.path().join("out");
    for domain in &tables {
        write_domain_tables(&out, &domain.tables, &domain.dimension, &domain.bridge).unwrap();
    }

    let sintoma = std::fs::read_to_string(out.join("sintoma.csv")).unwrap();
    assert_eq!(sintoma, "1;Assintomatico\n2;Fadiga\n3;Febre\n4;Tosse\n");
    let bridge = std::fs::read_to_string(out.join("notificacao_sintoma.csv")).unwrap();
    assert_eq!(bridge, "1;2\n1;3\n1;4\n2;4\n3;1\n");
    let condicao = std::fs::read_to_string(out.join("condicao.csv")).unwrap();
    assert_eq!(condicao, "1;Diabetes\n2;Hipertensao\n");
}
