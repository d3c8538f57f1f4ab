//! Serializable views of compiler output.

use serde::Serialize;
use tessera_core::TargetInfo;
use tessera_cranelift::RecordType;

#[derive(Serialize)]
pub struct LayoutReport {
    pub name: String,
    pub target: String,
    pub size: u32,
    pub align: u32,
    pub fields: Vec<FieldReport>,
}

#[derive(Serialize)]
pub struct FieldReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: u32,
}

impl LayoutReport {
    pub fn new(record: &RecordType, target: &TargetInfo) -> Self {
        Self {
            name: record.name().to_owned(),
            target: target.triple().to_string(),
            size: record.size(),
            align: record.align(),
            fields: record
                .fields()
                .iter()
                .map(|field| FieldReport {
                    name: field.name.clone(),
                    ty: field.ty.to_string(),
                    offset: field.offset,
                })
                .collect(),
        }
    }
}
