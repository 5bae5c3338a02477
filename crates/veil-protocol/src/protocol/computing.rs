//! Computing party.
//!
//! Reads the descriptor, loads the evaluation-only context, evaluates the
//! primitive operation and writes the encoded result. Never holds secret
//! material.
//!
//! An operand the descriptor does not name is supplied locally: the party's
//! own vector for that operand (translated like the delegating side would),
//! or the neutral placeholder `1.0` of declared length.

use super::{ProtocolState, Stage, StateCell};
use crate::context::{self, load_context};
use crate::error::{ProtocolError, ProtocolResult};
use crate::handoff::HandoffMedium;
use crate::package::{DelegationPackage, Descriptor};
use crate::translator::translate_operand;
use tracing::{debug, info, warn};
use veil_engine::ConfidentialityEngine;
use veil_types::{ComputationRequest, OperandSlot, PLACEHOLDER_VALUE};

/// Computing party state machine
pub struct ComputingParty<E: ConfidentialityEngine, M: HandoffMedium> {
    engine: E,
    medium: M,
    descriptor: Descriptor,
    context: E::Context,
    local: Option<ComputationRequest>,
    state: StateCell,
}

impl<E: ConfidentialityEngine, M: HandoffMedium> ComputingParty<E, M> {
    /// Read the descriptor and public context; starts in `Transferred`
    pub fn from_descriptor(engine: E, medium: M, descriptor_location: &str) -> ProtocolResult<Self> {
        let stage = Stage::Compute;
        let descriptor = Descriptor::load(&medium, descriptor_location, stage)?;
        let context = load_context(
            &engine,
            &medium,
            stage,
            &descriptor.context_path(),
            &descriptor.public_material_path(),
            None,
        )?;

        if let Some(backend) = descriptor.backend.filter(|b| *b != engine.info().backend) {
            warn!(
                descriptor_backend = %backend,
                engine_backend = %engine.info().backend,
                "Descriptor was written for a different backend"
            );
        }
        info!(
            run_id = descriptor.run_id.as_deref().unwrap_or("-"),
            primitive = %descriptor.primitive_operation,
            "Loaded delegation descriptor"
        );

        Ok(Self {
            engine,
            medium,
            descriptor,
            context,
            local: None,
            state: StateCell::new(ProtocolState::Transferred),
        })
    }

    /// The computing party's own input, used for operands the descriptor omits
    pub fn with_local_input(mut self, request: ComputationRequest) -> Self {
        self.local = Some(request);
        self
    }

    pub fn state(&self) -> ProtocolState {
        self.state.get()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Transferred -> Computed. Returns the result location.
    pub fn compute(&mut self) -> ProtocolResult<String> {
        self.state.begin(Stage::Compute)?;
        let outcome = self.run_compute();
        self.state.finish(Stage::Compute, outcome)
    }

    fn run_compute(&self) -> ProtocolResult<String> {
        let stage = Stage::Compute;
        let result_location = self
            .descriptor
            .result_path()
            .ok_or_else(|| ProtocolError::configuration(stage, "descriptor has no result location"))?;
        if self.descriptor.operand_a_location.is_none() && self.descriptor.operand_b_location.is_none() {
            return Err(ProtocolError::configuration(stage, "descriptor names no operand"));
        }

        let package: DelegationPackage<E::Handle> =
            DelegationPackage::load(&self.engine, &self.medium, self.descriptor.clone())?;
        let (primitive, operand_a, operand_b) = package.into_parts();

        let operand_a = match operand_a {
            Some(handle) => handle,
            None => self.local_operand(OperandSlot::A)?,
        };
        let operand_b = match operand_b {
            Some(handle) => handle,
            None => self.local_operand(OperandSlot::B)?,
        };

        let result = self
            .engine
            .evaluate(&self.context, primitive, &operand_a, &operand_b)
            .map_err(ProtocolError::engine(stage))?;
        let bytes = self
            .engine
            .handle_to_bytes(&result)
            .map_err(ProtocolError::engine(stage))?;
        context::write(&self.medium, stage, &result_location, &bytes)?;

        info!(
            run_id = self.descriptor.run_id.as_deref().unwrap_or("-"),
            primitive = %primitive,
            location = %result_location,
            "Computed result"
        );
        Ok(result_location)
    }

    /// Encode the local vector for `slot`, or the placeholder
    fn local_operand(&self, slot: OperandSlot) -> ProtocolResult<E::Handle> {
        let stage = Stage::Compute;
        let declared = self.declared_length()?;
        let operation = self.descriptor.requested_operation;

        let own = self.local.as_ref().and_then(|request| {
            let values = match slot {
                OperandSlot::A => &request.vector_a,
                OperandSlot::B => &request.vector_b,
            };
            (values.len() == declared).then_some((request.operation, values))
        });

        let values = match own {
            Some((local_op, values)) => {
                let op = operation.unwrap_or(local_op);
                debug!(slot = %slot, op = %op, "Using local operand");
                translate_operand(op, slot, values)
            }
            None => {
                debug!(slot = %slot, len = declared, "Using placeholder operand");
                vec![PLACEHOLDER_VALUE; declared]
            }
        };

        self.engine
            .encode(&self.context, &values)
            .map_err(ProtocolError::engine(stage))
    }

    fn declared_length(&self) -> ProtocolResult<usize> {
        if let Some(len) = self.descriptor.declared_length {
            return Ok(len);
        }
        self.local
            .as_ref()
            .map(|r| r.declared_length)
            .ok_or_else(|| {
                ProtocolError::configuration(
                    Stage::Compute,
                    "declared length unknown: descriptor omits it and no local input given",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locations;
    use crate::handoff::MemoryHandoff;
    use crate::protocol::DelegatingParty;
    use veil_engine::MockEngine;
    use veil_types::Operation;

    fn transferred(request: ComputationRequest) -> (MockEngine, MemoryHandoff) {
        let engine = MockEngine::default();
        let medium = MemoryHandoff::new();
        let mut owner = DelegatingParty::new(
            engine.clone(),
            medium.clone(),
            Locations::default(),
            request,
        );
        owner.prepare_and_transfer().unwrap();
        (engine, medium)
    }

    #[test]
    fn test_compute_uses_placeholder_for_missing_operand() {
        let (engine, medium) =
            transferred(ComputationRequest::new(3, Operation::Mul).with_a(vec![1.0, 2.0, 3.0]));

        let mut server =
            ComputingParty::from_descriptor(engine.clone(), medium.clone(), "data_to_server.json")
                .unwrap();
        let location = server.compute().unwrap();
        assert_eq!(server.state(), ProtocolState::Computed);

        let bytes = medium.read(&location).unwrap();
        let result = engine.handle_from_bytes(&bytes).unwrap();
        assert_eq!(result.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_compute_uses_translated_local_operand() {
        let (engine, medium) =
            transferred(ComputationRequest::new(2, Operation::Div).with_a(vec![10.0, 20.0]));

        let local = ComputationRequest::new(2, Operation::Div).with_b(vec![2.0, 4.0]);
        let mut server =
            ComputingParty::from_descriptor(engine.clone(), medium.clone(), "data_to_server.json")
                .unwrap()
                .with_local_input(local);
        let location = server.compute().unwrap();

        let result = engine
            .handle_from_bytes(&medium.read(&location).unwrap())
            .unwrap();
        assert_eq!(result.values, vec![5.0, 5.0]);
    }

    #[test]
    fn test_compute_twice_is_rejected() {
        let (engine, medium) =
            transferred(ComputationRequest::new(1, Operation::Add).with_a(vec![1.0]).with_b(vec![2.0]));
        let mut server =
            ComputingParty::from_descriptor(engine, medium, "data_to_server.json").unwrap();
        server.compute().unwrap();
        assert!(matches!(
            server.compute().unwrap_err(),
            ProtocolError::InvalidTransition { stage: Stage::Compute, .. }
        ));
    }

    #[test]
    fn test_missing_descriptor_is_io_error() {
        let err = ComputingParty::from_descriptor(
            MockEngine::default(),
            MemoryHandoff::new(),
            "data_to_server.json",
        )
        .err()
        .unwrap();
        assert!(matches!(err, ProtocolError::Io { stage: Stage::Compute, .. }));
    }
}
