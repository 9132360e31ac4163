//! Tests for the binary catalog format and equation source round trips

#![allow(clippy::disallowed_methods)] // Integration test - unwrap is acceptable

use perfmon_calc::{
    load_catalog, save_catalog, CalcError, Catalog, CatalogDefinition, Equation, Evaluator,
    NormalizationInputs, PersistReader, PersistWriter, TypedValue,
};

const CATALOG: &str = r#"
device:
  name: TestGpu
  generation: lnl
  globals:
    VectorEngineTotalCount: { u32: 64 }
    GpuTimestampFrequency: { u64: 19200000 }
    GtSliceMask: { byte_array: [3, 0, 0, 0, 0, 0, 0, 0] }
    Scale: { f32: 0.5 }
    HasL3: { bool: true }
metric_sets:
  - symbol_name: RenderBasic
    short_name: Render Basic
    api_mask: 1
    raw_report_size: 32
    query_report_size: 32
    metrics:
      - symbol_name: GpuTime
        long_name: GPU time elapsed
        group: GPU
        metric_type: duration
        units: ns
        delta_function: NS_TIME
        io_read: "qw@0 1000000000 UMUL $GpuTimestampFrequency UDIV"
      - symbol_name: GpuCoreClocks
        metric_type: event
        delta_function: DELTA 32
        io_read: dw@8
      - symbol_name: EuActive
        result_type: float
        metric_type: ratio
        units: percent
        low_watermark: 0
        high_watermark: 100
        delta_function: DELTA 40
        io_read: "rd40@12,16"
        normalization: EuAggrDuration
        max_value: "100"
        availability: "$GtSliceMask 1 AND"
    informations:
      - symbol_name: ReportReason
        info_type: report_reason
        io_read: "bm@20,19,6"
      - symbol_name: ContextId
        info_type: context_id
        io_read: dw@24
        overflow_function: GET_LAST
"#;

fn catalog() -> Catalog {
    CatalogDefinition::from_yaml_str(CATALOG).unwrap().build().unwrap()
}

// ============================================================================
// Catalog round trip
// ============================================================================

#[test]
fn test_catalog_round_trip() {
    let original = catalog();
    let bytes = save_catalog(&original).unwrap();
    let restored = load_catalog(&bytes).unwrap();

    assert_eq!(restored.device().as_ref(), original.device().as_ref());
    assert_eq!(restored.sets(), original.sets());

    let set = restored.set("RenderBasic").unwrap();
    assert_eq!(set.short_name, "Render Basic");
    let eu = set.metric(2).unwrap();
    assert_eq!(eu.high_watermark, 100);
    assert_eq!(eu.units, "percent");
}

#[test]
fn test_catalog_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.bin");
    std::fs::write(&path, save_catalog(&catalog()).unwrap()).unwrap();

    let restored = load_catalog(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(restored.sets(), catalog().sets());
}

#[test]
fn test_trailing_bytes_are_tolerated() {
    let mut bytes = save_catalog(&catalog()).unwrap().to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    assert_eq!(load_catalog(&bytes).unwrap().sets(), catalog().sets());
}

#[test]
fn test_limited_writer_reports_overflow() {
    let mut writer = PersistWriter::with_capacity_limit(16);
    writer.write_header().unwrap();
    let err = writer.write_catalog(&catalog()).unwrap_err();
    assert!(matches!(err, CalcError::BufferTooSmall { .. }), "{:?}", err);
}

#[test]
fn test_truncated_catalog_fails() {
    let bytes = save_catalog(&catalog()).unwrap();
    for cut in [4, 12, bytes.len() / 2, bytes.len() - 1] {
        let err = load_catalog(&bytes[..cut]).unwrap_err();
        assert!(matches!(err, CalcError::BufferTooSmall { .. }), "cut {}: {:?}", cut, err);
    }
}

#[test]
fn test_reader_walks_written_primitives() {
    let mut writer = PersistWriter::new();
    writer.put_u32(7).unwrap();
    writer.put_i64(-3).unwrap();
    writer.put_str("GpuTime").unwrap();
    writer.put_typed_value(&TypedValue::F32(0.25)).unwrap();

    let mut reader = PersistReader::new(writer.finish());
    assert_eq!(reader.get_u32().unwrap(), 7);
    assert_eq!(reader.get_i64().unwrap(), -3);
    assert_eq!(reader.get_string().unwrap(), "GpuTime");
    assert_eq!(reader.get_typed_value().unwrap(), TypedValue::F32(0.25));
    assert_eq!(reader.remaining(), 0);
}

// ============================================================================
// Equation source round trip
// ============================================================================

#[test]
fn test_equation_source_round_trip_evaluates_identically() {
    let catalog = catalog();
    let device = catalog.device();
    let raw: Vec<u8> = (0u8..32).map(|b| b.wrapping_mul(37)).collect();
    let evaluator = Evaluator::for_device(device);

    for source in [
        "qw@0 1000000000 UMUL $GpuTimestampFrequency UDIV",
        "rd40@12,16 $Scale FMUL",
        "bm@20,19,6 dw@24 XOR",
        "rd8@3 rd16@6 UADD 2 <<",
        "dw@8 0x10 UMAX $VectorEngineTotalCount UDIV",
    ] {
        let equation = Equation::parse(source, device).unwrap();
        let reparsed = Equation::parse(equation.source(), device).unwrap();
        assert_eq!(reparsed.elements(), equation.elements(), "{}", source);
        assert_eq!(evaluator.read(&reparsed, &raw), evaluator.read(&equation, &raw), "{}", source);
    }
}

#[test]
fn test_persisted_normalization_evaluates_identically() {
    let original = catalog();
    let restored = load_catalog(&save_catalog(&original).unwrap()).unwrap();

    let deltas = [TypedValue::U64(5), TypedValue::U64(800), TypedValue::U64(12_800)];
    let outputs = [TypedValue::ZERO; 3];
    let inputs = NormalizationInputs {
        deltas: &deltas,
        outputs: &outputs,
        previous: &[],
        index: 2,
    };

    let before = original.set("RenderBasic").unwrap().metric(2).unwrap();
    let after = restored.set("RenderBasic").unwrap().metric(2).unwrap();
    let max_before = Evaluator::for_device(original.device())
        .normalize(before.max_value.as_ref().unwrap(), inputs);
    let max_after = Evaluator::for_device(restored.device())
        .normalize(after.max_value.as_ref().unwrap(), inputs);
    assert_eq!(max_before, TypedValue::U64(100));
    assert_eq!(max_before, max_after);
}
