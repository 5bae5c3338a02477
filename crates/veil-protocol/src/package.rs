//! Delegation package and its descriptor.
//!
//! The descriptor is the JSON record handed to the computing party:
//!
//! ```json
//! {
//!   "version": 1,
//!   "runId": "6f0c…",
//!   "backend": "masking",
//!   "primitiveOperation": "mul",
//!   "requestedOperation": "div",
//!   "declaredLength": 3,
//!   "basePath": "data",
//!   "operandALocation": "operand-a.bin",
//!   "operandBLocation": "operand-b.bin",
//!   "resultLocation": "result.bin",
//!   "contextLocation": "context.bin",
//!   "publicMaterialLocation": "key-public.bin"
//! }
//! ```
//!
//! Locations are relative to `basePath`. Readers ignore unknown fields and
//! treat every optional field as absent when missing, so older and newer
//! writers interoperate. Encoded operands live at their own locations in the
//! engine's wire form; the package codec adds nothing to them.

use crate::config::{join_location, Locations};
use crate::context::{read, write};
use crate::error::{ProtocolError, ProtocolResult};
use crate::handoff::HandoffMedium;
use crate::protocol::Stage;
use crate::translator::Translation;
use serde::{Deserialize, Serialize};
use tracing::debug;
use veil_engine::{Backend, ConfidentialityEngine};
use veil_types::{OperandSlot, Operation, PrimitiveOperation};

/// Descriptor format version written by this crate
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Structured record naming everything the computing party needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,

    pub primitive_operation: PrimitiveOperation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_operation: Option<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_length: Option<usize>,

    pub base_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand_a_location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand_b_location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_location: Option<String>,

    pub context_location: String,

    pub public_material_location: String,
}

impl Descriptor {
    /// Descriptor for `primitive` with result and context locations from `locations`
    pub fn new(primitive: PrimitiveOperation, locations: &Locations) -> Self {
        Self {
            version: Some(DESCRIPTOR_VERSION),
            run_id: None,
            backend: None,
            primitive_operation: primitive,
            requested_operation: None,
            declared_length: None,
            base_path: locations.base_path.clone(),
            operand_a_location: None,
            operand_b_location: None,
            result_location: Some(locations.result.clone()),
            context_location: locations.context.clone(),
            public_material_location: locations.public_material.clone(),
        }
    }

    /// Full location of a `basePath`-relative entry
    pub fn resolve(&self, name: &str) -> String {
        join_location(&self.base_path, name)
    }

    pub fn operand_location(&self, slot: OperandSlot) -> Option<String> {
        let name = match slot {
            OperandSlot::A => self.operand_a_location.as_deref(),
            OperandSlot::B => self.operand_b_location.as_deref(),
        };
        name.map(|n| self.resolve(n))
    }

    pub fn result_path(&self) -> Option<String> {
        self.result_location.as_deref().map(|n| self.resolve(n))
    }

    pub fn context_path(&self) -> String {
        self.resolve(&self.context_location)
    }

    pub fn public_material_path(&self) -> String {
        self.resolve(&self.public_material_location)
    }

    /// Take over operand locations this descriptor leaves unset from one
    /// another owner wrote for the same primitive and base path.
    ///
    /// Returns the adopted slots; nothing is adopted from a descriptor for a
    /// different primitive or base path.
    pub fn adopt_operands(&mut self, previous: &Descriptor) -> Vec<OperandSlot> {
        if previous.primitive_operation != self.primitive_operation
            || previous.base_path != self.base_path
        {
            return Vec::new();
        }

        let mut adopted = Vec::new();
        for (own, theirs, slot) in [
            (&mut self.operand_a_location, &previous.operand_a_location, OperandSlot::A),
            (&mut self.operand_b_location, &previous.operand_b_location, OperandSlot::B),
        ] {
            if own.is_none() && theirs.is_some() {
                own.clone_from(theirs);
                adopted.push(slot);
            }
        }
        if !adopted.is_empty() {
            self.declared_length = self.declared_length.max(previous.declared_length);
        }
        adopted
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ProtocolError::configuration(Stage::Transfer, e.to_string()))
    }

    pub fn from_json(json: &str, stage: Stage) -> ProtocolResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProtocolError::configuration(stage, format!("malformed descriptor: {e}")))
    }

    /// Read and parse a descriptor from the medium
    pub fn load<M: HandoffMedium>(medium: &M, location: &str, stage: Stage) -> ProtocolResult<Self> {
        let bytes = read(medium, stage, location)?;
        let json = String::from_utf8(bytes).map_err(|e| {
            ProtocolError::configuration(stage, format!("descriptor is not UTF-8: {e}"))
        })?;
        Self::from_json(&json, stage)
    }
}

/// Encoded operands plus the descriptor that names them.
///
/// Operands the local party does not own are `None`; their locations are
/// omitted from the descriptor.
#[derive(Debug, Clone)]
pub struct DelegationPackage<H> {
    pub descriptor: Descriptor,
    pub operand_a: Option<H>,
    pub operand_b: Option<H>,
}

impl<H: Clone> DelegationPackage<H> {
    /// Encode the present operands of a translation
    pub fn encode<E>(
        engine: &E,
        ctx: &E::Context,
        translation: &Translation,
        locations: &Locations,
    ) -> ProtocolResult<Self>
    where
        E: ConfidentialityEngine<Handle = H>,
    {
        let stage = Stage::Prepare;
        let mut descriptor = Descriptor::new(translation.primitive, locations);
        descriptor.requested_operation = Some(translation.requested);
        descriptor.backend = Some(engine.info().backend);
        descriptor.declared_length =
            Some(translation.operand_a.len().max(translation.operand_b.len()));

        let encode = |values: &[f64]| -> ProtocolResult<Option<H>> {
            if values.is_empty() {
                return Ok(None);
            }
            engine
                .encode(ctx, values)
                .map(Some)
                .map_err(ProtocolError::engine(stage))
        };
        let operand_a = encode(&translation.operand_a)?;
        let operand_b = encode(&translation.operand_b)?;

        if operand_a.is_some() {
            descriptor.operand_a_location = Some(locations.operand_a.clone());
        }
        if operand_b.is_some() {
            descriptor.operand_b_location = Some(locations.operand_b.clone());
        }

        Ok(Self {
            descriptor,
            operand_a,
            operand_b,
        })
    }

    /// Write encoded operands, then the descriptor
    pub fn store<E, M>(&self, engine: &E, medium: &M, descriptor_location: &str) -> ProtocolResult<()>
    where
        E: ConfidentialityEngine<Handle = H>,
        M: HandoffMedium,
    {
        let stage = Stage::Transfer;
        for slot in [OperandSlot::A, OperandSlot::B] {
            let (Some(handle), Some(location)) =
                (self.operand(slot), self.descriptor.operand_location(slot))
            else {
                continue;
            };
            let bytes = engine
                .handle_to_bytes(handle)
                .map_err(ProtocolError::engine(stage))?;
            write(medium, stage, &location, &bytes)?;
            debug!(slot = %slot, location = %location, bytes = bytes.len(), "Stored operand");
        }

        let json = self.descriptor.to_json()?;
        write(medium, stage, descriptor_location, json.as_bytes())
    }

    /// Read the operands a descriptor names
    pub fn load<E, M>(engine: &E, medium: &M, descriptor: Descriptor) -> ProtocolResult<Self>
    where
        E: ConfidentialityEngine<Handle = H>,
        M: HandoffMedium,
    {
        let stage = Stage::Compute;
        let load = |slot: OperandSlot| -> ProtocolResult<Option<H>> {
            let Some(location) = descriptor.operand_location(slot) else {
                return Ok(None);
            };
            let bytes = read(medium, stage, &location)?;
            engine
                .handle_from_bytes(&bytes)
                .map(Some)
                .map_err(ProtocolError::engine(stage))
        };
        let operand_a = load(OperandSlot::A)?;
        let operand_b = load(OperandSlot::B)?;

        Ok(Self {
            descriptor,
            operand_a,
            operand_b,
        })
    }

    pub fn operand(&self, slot: OperandSlot) -> Option<&H> {
        match slot {
            OperandSlot::A => self.operand_a.as_ref(),
            OperandSlot::B => self.operand_b.as_ref(),
        }
    }

    pub fn primitive(&self) -> PrimitiveOperation {
        self.descriptor.primitive_operation
    }

    /// Split into primitive operation and encoded operand handles
    pub fn into_parts(self) -> (PrimitiveOperation, Option<H>, Option<H>) {
        (
            self.descriptor.primitive_operation,
            self.operand_a,
            self.operand_b,
        )
    }
}
