//! Binary catalog persistence
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header   : magic u32 | version u32
//! catalog  : device | set count u32 | sets...
//! device   : name str | generation u32 | global count u32 | (name str, value)...
//! value    : kind u32 | payload (u32, u64, f32 bits, bool as u32, or str-like bytes)
//! str      : len u32 | utf-8 bytes           (absent string or equation = len 0)
//! ```
//!
//! Metric sets, metrics and informations are written field by field in a
//! fixed order; equations are stored as source strings and re-parsed
//! against the restored device on load.

use crate::api_mask::ApiMask;
use crate::catalog::Catalog;
use crate::delta::{DeltaFunction, DeltaKind};
use crate::device::{Device, Generation};
use crate::equation::Equation;
use crate::error::{CalcError, Result};
use crate::information::{Information, InformationType};
use crate::metric::{Metric, MetricType};
use crate::metric_set::MetricSet;
use crate::typed_value::{ResultType, TypedValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAGIC: u32 = 0x4D44_4341;
pub const VERSION: u32 = 1;

const KIND_U32: u32 = 0;
const KIND_U64: u32 = 1;
const KIND_F32: u32 = 2;
const KIND_BOOL: u32 = 3;
const KIND_BYTE_ARRAY: u32 = 4;

/// Serialize a catalog including the header
pub fn save_catalog(catalog: &Catalog) -> Result<Bytes> {
    let mut writer = PersistWriter::new();
    writer.write_header()?;
    writer.write_catalog(catalog)?;
    Ok(writer.finish())
}

/// Restore a catalog written by [`save_catalog`]
pub fn load_catalog(data: &[u8]) -> Result<Catalog> {
    let mut reader = PersistReader::new(Bytes::copy_from_slice(data));
    reader.read_header()?;
    let catalog = reader.read_catalog()?;
    if reader.remaining() != 0 {
        tracing::warn!(trailing = reader.remaining(), "Trailing bytes after catalog");
    }
    Ok(catalog)
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Default)]
pub struct PersistWriter {
    buf: BytesMut,
    limit: Option<usize>,
}

impl PersistWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer over a fixed-size buffer; overflowing it fails the write
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            limit: Some(limit),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn reserve(&mut self, needed: usize) -> Result<()> {
        if let Some(limit) = self.limit {
            let offset = self.buf.len();
            if offset + needed > limit {
                return Err(CalcError::BufferTooSmall {
                    offset,
                    needed,
                    available: limit - offset,
                });
            }
        }
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.reserve(8)?;
        self.buf.put_u64_le(value);
        Ok(())
    }

    pub fn put_i64(&mut self, value: i64) -> Result<()> {
        self.reserve(8)?;
        self.buf.put_i64_le(value);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| CalcError::persist(format!("field of {} bytes too long", bytes.len())))?;
        self.reserve(4 + bytes.len())?;
        self.buf.put_u32_le(len);
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn put_str(&mut self, value: &str) -> Result<()> {
        self.put_bytes(value.as_bytes())
    }

    pub fn put_equation(&mut self, equation: Option<&Equation>) -> Result<()> {
        self.put_str(equation.map_or("", Equation::source))
    }

    pub fn put_delta_function(&mut self, function: DeltaFunction) -> Result<()> {
        self.put_u32(function.kind.to_raw())?;
        self.put_u32(function.bits)
    }

    pub fn put_typed_value(&mut self, value: &TypedValue) -> Result<()> {
        match value {
            TypedValue::U32(v) => {
                self.put_u32(KIND_U32)?;
                self.put_u32(*v)
            },
            TypedValue::U64(v) => {
                self.put_u32(KIND_U64)?;
                self.put_u64(*v)
            },
            TypedValue::F32(v) => {
                self.put_u32(KIND_F32)?;
                self.put_u32(v.to_bits())
            },
            TypedValue::Bool(v) => {
                self.put_u32(KIND_BOOL)?;
                self.put_u32(u32::from(*v))
            },
            TypedValue::ByteArray(bytes) => {
                self.put_u32(KIND_BYTE_ARRAY)?;
                self.put_bytes(bytes)
            },
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.put_u32(MAGIC)?;
        self.put_u32(VERSION)
    }

    pub fn write_information(&mut self, information: &Information) -> Result<()> {
        self.put_str(&information.symbol_name)?;
        self.put_str(&information.short_name)?;
        self.put_str(&information.group)?;
        self.put_str(&information.long_name)?;
        self.put_u32(information.api_mask.bits())?;
        self.put_u32(information.info_type.to_raw())?;
        self.put_str(&information.units)?;
        self.put_equation(information.availability.as_ref())?;
        self.put_delta_function(information.overflow_function)?;
        self.put_equation(information.io_read.as_ref())?;
        self.put_equation(information.query_read.as_ref())
    }

    pub fn write_metric(&mut self, metric: &Metric) -> Result<()> {
        self.put_str(&metric.symbol_name)?;
        self.put_str(&metric.short_name)?;
        self.put_str(&metric.group)?;
        self.put_str(&metric.long_name)?;
        self.put_u32(metric.api_mask.bits())?;
        self.put_u32(metric.metric_type.to_raw())?;
        self.put_u32(metric.result_type.to_raw())?;
        self.put_str(&metric.units)?;
        self.put_i64(metric.low_watermark)?;
        self.put_i64(metric.high_watermark)?;
        self.put_delta_function(metric.delta_function)?;
        self.put_equation(metric.availability.as_ref())?;
        self.put_equation(metric.query_read.as_ref())?;
        self.put_equation(metric.io_read.as_ref())?;
        self.put_equation(metric.normalization.as_ref())?;
        self.put_equation(metric.max_value.as_ref())
    }

    pub fn write_metric_set(&mut self, set: &MetricSet) -> Result<()> {
        self.put_str(&set.symbol_name)?;
        self.put_str(&set.short_name)?;
        self.put_u32(set.api_mask.bits())?;
        self.put_u32(set.raw_report_size)?;
        self.put_u32(set.query_report_size)?;
        self.put_u32(count(set.metrics_count())?)?;
        for metric in set.metrics() {
            self.write_metric(metric)?;
        }
        self.put_u32(count(set.information_count())?)?;
        for information in set.informations() {
            self.write_information(information)?;
        }
        Ok(())
    }

    pub fn write_device(&mut self, device: &Device) -> Result<()> {
        self.put_str(&device.name)?;
        self.put_u32(device.generation.to_raw())?;
        let names = device.global_names();
        self.put_u32(count(names.len())?)?;
        for name in names {
            self.put_str(name)?;
            let value = device.global(name).cloned().unwrap_or_default();
            self.put_typed_value(&value)?;
        }
        Ok(())
    }

    pub fn write_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        self.write_device(catalog.device())?;
        self.put_u32(count(catalog.sets().len())?)?;
        for set in catalog.sets() {
            self.write_metric_set(set)?;
        }
        tracing::debug!(bytes = self.buf.len(), sets = catalog.sets().len(), "Catalog serialized");
        Ok(())
    }
}

fn count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CalcError::persist(format!("count {} exceeds u32", len)))
}

// ============================================================================
// Reader
// ============================================================================

#[derive(Debug)]
pub struct PersistReader {
    buf: Bytes,
    offset: usize,
}

impl PersistReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, needed: usize) -> Result<()> {
        let available = self.buf.remaining();
        if needed > available {
            return Err(CalcError::BufferTooSmall {
                offset: self.offset,
                needed,
                available,
            });
        }
        Ok(())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        self.offset += 4;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        self.offset += 8;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        self.need(8)?;
        self.offset += 8;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_bytes(&mut self) -> Result<Bytes> {
        let len = self.get_u32()? as usize;
        self.need(len)?;
        self.offset += len;
        Ok(self.buf.split_to(len))
    }

    pub fn get_string(&mut self) -> Result<String> {
        let offset = self.offset;
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CalcError::persist(format!("invalid UTF-8 at offset {}: {}", offset, e)))
    }

    pub fn get_equation(&mut self, device: &Device) -> Result<Option<Equation>> {
        let source = self.get_string()?;
        if source.is_empty() {
            return Ok(None);
        }
        Equation::parse(&source, device).map(Some)
    }

    pub fn get_delta_function(&mut self) -> Result<DeltaFunction> {
        let raw = self.get_u32()?;
        let bits = self.get_u32()?;
        let kind = DeltaKind::from_raw(raw)
            .ok_or_else(|| CalcError::persist(format!("invalid delta function type {}", raw)))?;
        Ok(DeltaFunction { kind, bits })
    }

    pub fn get_typed_value(&mut self) -> Result<TypedValue> {
        let kind = self.get_u32()?;
        let value = match kind {
            KIND_U32 => TypedValue::U32(self.get_u32()?),
            KIND_U64 => TypedValue::U64(self.get_u64()?),
            KIND_F32 => TypedValue::F32(f32::from_bits(self.get_u32()?)),
            KIND_BOOL => TypedValue::Bool(self.get_u32()? != 0),
            KIND_BYTE_ARRAY => TypedValue::ByteArray(self.get_bytes()?.to_vec()),
            other => return Err(CalcError::persist(format!("invalid value type {}", other))),
        };
        Ok(value)
    }

    pub fn read_header(&mut self) -> Result<()> {
        let magic = self.get_u32()?;
        if magic != MAGIC {
            return Err(CalcError::persist(format!("bad magic {:#010x}", magic)));
        }
        let version = self.get_u32()?;
        if version != VERSION {
            return Err(CalcError::persist(format!("unsupported version {}", version)));
        }
        Ok(())
    }

    pub fn read_information(&mut self, device: &Device) -> Result<Information> {
        let symbol_name = self.get_string()?;
        let short_name = self.get_string()?;
        let group = self.get_string()?;
        let long_name = self.get_string()?;
        let api_mask = ApiMask(self.get_u32()?);
        let raw_type = self.get_u32()?;
        let info_type = InformationType::from_raw(raw_type)
            .ok_or_else(|| CalcError::persist(format!("invalid information type {}", raw_type)))?;

        let mut information = Information::new(symbol_name, info_type);
        information.short_name = short_name;
        information.group = group;
        information.long_name = long_name;
        information.api_mask = api_mask;
        information.units = self.get_string()?;
        information.availability = self.get_equation(device)?;
        information.overflow_function = self.get_delta_function()?;
        information.io_read = self.get_equation(device)?;
        information.query_read = self.get_equation(device)?;
        Ok(information)
    }

    pub fn read_metric(&mut self, device: &Device) -> Result<Metric> {
        let symbol_name = self.get_string()?;
        let short_name = self.get_string()?;
        let group = self.get_string()?;
        let long_name = self.get_string()?;
        let api_mask = ApiMask(self.get_u32()?);
        let raw_type = self.get_u32()?;
        let metric_type = MetricType::from_raw(raw_type)
            .ok_or_else(|| CalcError::persist(format!("invalid metric type {}", raw_type)))?;
        let raw_result = self.get_u32()?;
        let result_type = ResultType::from_raw(raw_result)
            .ok_or_else(|| CalcError::persist(format!("invalid result type {}", raw_result)))?;

        let mut metric = Metric::new(symbol_name, result_type);
        metric.short_name = short_name;
        metric.group = group;
        metric.long_name = long_name;
        metric.api_mask = api_mask;
        metric.metric_type = metric_type;
        metric.units = self.get_string()?;
        metric.low_watermark = self.get_i64()?;
        metric.high_watermark = self.get_i64()?;
        metric.delta_function = self.get_delta_function()?;
        metric.availability = self.get_equation(device)?;
        metric.query_read = self.get_equation(device)?;
        metric.io_read = self.get_equation(device)?;
        metric.normalization = self.get_equation(device)?;
        metric.max_value = self.get_equation(device)?;
        Ok(metric)
    }

    pub fn read_metric_set(&mut self, device: &Device) -> Result<MetricSet> {
        let symbol_name = self.get_string()?;
        let short_name = self.get_string()?;
        let api_mask = ApiMask(self.get_u32()?);
        let raw_report_size = self.get_u32()?;
        let query_report_size = self.get_u32()?;

        let metrics_count = self.get_u32()?;
        let metrics = (0..metrics_count)
            .map(|_| self.read_metric(device))
            .collect::<Result<Vec<_>>>()?;
        let information_count = self.get_u32()?;
        let informations = (0..information_count)
            .map(|_| self.read_information(device))
            .collect::<Result<Vec<_>>>()?;

        let mut set = MetricSet::new(symbol_name, api_mask)
            .with_report_sizes(raw_report_size, query_report_size)
            .with_metrics(metrics)
            .with_informations(informations);
        set.short_name = short_name;
        Ok(set)
    }

    pub fn read_device(&mut self) -> Result<Device> {
        let name = self.get_string()?;
        let raw_generation = self.get_u32()?;
        let generation = Generation::from_raw(raw_generation)
            .ok_or_else(|| CalcError::persist(format!("invalid generation {}", raw_generation)))?;
        let mut device = Device::new(name, generation);
        for _ in 0..self.get_u32()? {
            let name = self.get_string()?;
            let value = self.get_typed_value()?;
            device.insert_global(name, value);
        }
        Ok(device)
    }

    pub fn read_catalog(&mut self) -> Result<Catalog> {
        let device = self.read_device()?;
        let set_count = self.get_u32()?;
        let sets = (0..set_count)
            .map(|_| self.read_metric_set(&device))
            .collect::<Result<Vec<_>>>()?;
        Ok(Catalog::new(device, sets))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device::new("test", Generation::Lnl)
            .with_global("EuCoresTotalCount", 64u32)
            .with_global("GpuTimestampFrequency", 19_200_000u64)
            .with_global("GtSliceMask", TypedValue::ByteArray(vec![1, 0, 0, 0, 0, 0, 0, 0]))
            .with_global("Scale", 0.5f32)
            .with_global("HasL3", true)
    }

    #[test]
    fn test_information_field_order() {
        let dev = device();
        let info = Information::new("ContextId", InformationType::ContextId)
            .with_io_read(Equation::parse("dw@8", &dev).unwrap());
        let mut writer = PersistWriter::new();
        writer.write_information(&info).unwrap();
        let bytes = writer.finish();

        let mut expected = BytesMut::new();
        for s in ["ContextId", "ContextId", "", ""] {
            expected.put_u32_le(s.len() as u32);
            expected.put_slice(s.as_bytes());
        }
        expected.put_u32_le(ApiMask::ALL.bits());
        expected.put_u32_le(4);
        expected.put_u32_le(0); // units
        expected.put_u32_le(0); // availability
        expected.put_u32_le(0); // overflow type
        expected.put_u32_le(0); // overflow bits
        expected.put_u32_le(4);
        expected.put_slice(b"dw@8");
        expected.put_u32_le(0); // query read
        assert_eq!(bytes, expected.freeze());
    }

    #[test]
    fn test_device_round_trip() {
        let dev = device();
        let mut writer = PersistWriter::new();
        writer.write_device(&dev).unwrap();
        let mut reader = PersistReader::new(writer.finish());
        assert_eq!(reader.read_device().unwrap(), dev);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_fixed_capacity_overflow() {
        let mut writer = PersistWriter::with_capacity_limit(6);
        writer.put_u32(1).unwrap();
        assert_eq!(
            writer.put_str("abc"),
            Err(CalcError::BufferTooSmall {
                offset: 4,
                needed: 7,
                available: 2
            })
        );
    }

    #[test]
    fn test_truncated_input() {
        let mut reader = PersistReader::new(Bytes::from_static(&[5, 0, 0, 0, b'a', b'b']));
        assert_eq!(
            reader.get_string(),
            Err(CalcError::BufferTooSmall {
                offset: 4,
                needed: 5,
                available: 2
            })
        );
    }

    #[test]
    fn test_bad_header() {
        let mut writer = PersistWriter::new();
        writer.put_u32(0xdead_beef).unwrap();
        writer.put_u32(VERSION).unwrap();
        let err = load_catalog(&writer.finish()).unwrap_err();
        assert!(matches!(err, CalcError::Persist(_)));
    }

    #[test]
    fn test_invalid_enum_value() {
        let mut writer = PersistWriter::new();
        writer.put_u32(9).unwrap();
        writer.put_u32(0).unwrap();
        let mut reader = PersistReader::new(writer.finish());
        assert!(reader.get_delta_function().is_err());
    }
}
