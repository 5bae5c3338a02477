//! Delegating party (data owner).
//!
//! Drives `prepare` and `transfer` in one invocation, then `retrieve` and
//! `verify` in a later one (see [`DelegatingParty::resume`]).

use super::{ProtocolState, Stage, StateCell};
use crate::config::Locations;
use crate::context::{self, obtain_context, persist_context};
use crate::error::{ProtocolError, ProtocolResult};
use crate::handoff::HandoffMedium;
use crate::package::{DelegationPackage, Descriptor};
use crate::resolver::require_valid_role;
use crate::translator::{translate, Translation};
use crate::verifier::ResultVerifier;
use tracing::{debug, info, warn};
use veil_engine::ConfidentialityEngine;
use veil_types::{ComputationRequest, OperandRole, VerificationReport};

/// Delegating party state machine
pub struct DelegatingParty<E: ConfidentialityEngine, M: HandoffMedium> {
    engine: E,
    medium: M,
    locations: Locations,
    load_context: bool,
    run_id: String,
    request: ComputationRequest,
    state: StateCell,
    role: Option<OperandRole>,
    translation: Option<Translation>,
    context: Option<E::Context>,
    package: Option<DelegationPackage<E::Handle>>,
    descriptor: Option<Descriptor>,
    result: Option<Vec<f64>>,
}

impl<E: ConfidentialityEngine, M: HandoffMedium> DelegatingParty<E, M> {
    /// Fresh run in `Idle`
    pub fn new(engine: E, medium: M, locations: Locations, request: ComputationRequest) -> Self {
        Self {
            engine,
            medium,
            locations,
            load_context: false,
            run_id: uuid::Uuid::new_v4().to_string(),
            request,
            state: StateCell::new(ProtocolState::Idle),
            role: None,
            translation: None,
            context: None,
            package: None,
            descriptor: None,
            result: None,
        }
    }

    /// Reuse the persisted context instead of running keygen
    pub fn with_load_context(mut self, load: bool) -> Self {
        self.load_context = load;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Continue a transferred run in a later invocation.
    ///
    /// Reloads the context (with secret) and the descriptor, and recomputes
    /// role and translation from the same request. Nothing is encoded.
    pub fn resume(
        engine: E,
        medium: M,
        locations: Locations,
        request: ComputationRequest,
    ) -> ProtocolResult<Self> {
        let stage = Stage::Retrieve;
        let role = require_valid_role(
            stage,
            request.declared_length,
            &request.vector_a,
            &request.vector_b,
        )?;
        check_reference(stage, &request)?;
        let translation = translate(
            request.operation,
            &request.vector_a,
            &request.vector_b,
            &request.reference,
        );

        let context = context::load_context(
            &engine,
            &medium,
            stage,
            &locations.context_location(),
            &locations.public_material_location(),
            Some(&locations.secret_key_location()),
        )?;
        let descriptor = Descriptor::load(&medium, &locations.descriptor, stage)?;
        if let Some(op) = descriptor.requested_operation.filter(|op| *op != request.operation) {
            warn!(
                descriptor_op = %op,
                request_op = %request.operation,
                "Descriptor was written for a different operation"
            );
        }

        let run_id = descriptor
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(run_id = %run_id, role = %role, "Resumed delegation run");

        Ok(Self {
            engine,
            medium,
            locations,
            load_context: true,
            run_id,
            request,
            state: StateCell::new(ProtocolState::Transferred),
            role: Some(role),
            translation: Some(translation),
            context: Some(context),
            package: None,
            descriptor: Some(descriptor),
            result: None,
        })
    }

    pub fn state(&self) -> ProtocolState {
        self.state.get()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn role(&self) -> Option<OperandRole> {
        self.role
    }

    pub fn translation(&self) -> Option<&Translation> {
        self.translation.as_ref()
    }

    pub fn package(&self) -> Option<&DelegationPackage<E::Handle>> {
        self.package.as_ref()
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    pub fn result(&self) -> Option<&[f64]> {
        self.result.as_deref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Idle -> Prepared: resolve role, translate, obtain context, encode
    pub fn prepare(&mut self) -> ProtocolResult<&DelegationPackage<E::Handle>> {
        self.state.begin(Stage::Prepare)?;
        let outcome = self.run_prepare();
        self.state.finish(Stage::Prepare, outcome)?;
        self.package
            .as_ref()
            .ok_or_else(|| ProtocolError::configuration(Stage::Prepare, "no package produced"))
    }

    fn run_prepare(&mut self) -> ProtocolResult<()> {
        let stage = Stage::Prepare;
        let request = &self.request;
        info!(
            run_id = %self.run_id,
            operation = %request.operation,
            declared_length = request.declared_length,
            "Preparing delegation"
        );

        let role = require_valid_role(
            stage,
            request.declared_length,
            &request.vector_a,
            &request.vector_b,
        )?;
        check_reference(stage, request)?;
        debug!(
            role = %role.code(),
            len = request.declared_length,
            op = %request.operation,
            a = ?request.vector_a,
            b = ?request.vector_b,
            reference = ?request.reference,
            "Loaded request"
        );

        let translation = translate(
            request.operation,
            &request.vector_a,
            &request.vector_b,
            &request.reference,
        );
        debug!(
            primitive = %translation.primitive,
            a = ?translation.operand_a,
            b = ?translation.operand_b,
            reference = ?translation.reference,
            "Translated for computing party"
        );

        let ctx = obtain_context(&self.engine, &self.medium, &self.locations, self.load_context)?;
        let mut package = DelegationPackage::encode(&self.engine, &ctx, &translation, &self.locations)?;
        package.descriptor.run_id = Some(self.run_id.clone());
        package.descriptor.declared_length = Some(request.declared_length);

        info!(
            run_id = %self.run_id,
            role = %role,
            primitive = %translation.primitive,
            "Prepared delegation package"
        );

        self.role = Some(role);
        self.translation = Some(translation);
        self.context = Some(ctx);
        self.package = Some(package);
        Ok(())
    }

    /// Prepared -> Transferred: persist context, operands and descriptor
    pub fn transfer(&mut self) -> ProtocolResult<&Descriptor> {
        self.state.begin(Stage::Transfer)?;
        let outcome = self.run_transfer();
        self.state.finish(Stage::Transfer, outcome)?;
        self.descriptor
            .as_ref()
            .ok_or_else(|| ProtocolError::configuration(Stage::Transfer, "no descriptor written"))
    }

    fn run_transfer(&mut self) -> ProtocolResult<()> {
        let stage = Stage::Transfer;
        let (Some(ctx), Some(package)) = (&self.context, &mut self.package) else {
            return Err(ProtocolError::configuration(stage, "nothing prepared"));
        };

        if !self.load_context {
            persist_context(&self.engine, &self.medium, &self.locations, ctx)?;
        } else if let Some(previous) = joined_descriptor(&self.medium, &self.locations.descriptor)? {
            // Another owner of this run may already have delivered the other operand
            let adopted = package.descriptor.adopt_operands(&previous);
            for slot in &adopted {
                info!(run_id = %self.run_id, slot = %slot, "Kept operand delivered by another owner");
            }
            if adopted.is_empty() && previous.primitive_operation != package.descriptor.primitive_operation {
                warn!(
                    previous = %previous.primitive_operation,
                    primitive = %package.descriptor.primitive_operation,
                    "Replacing descriptor written for a different primitive"
                );
            }
        }
        package.store(&self.engine, &self.medium, &self.locations.descriptor)?;

        info!(
            run_id = %self.run_id,
            descriptor = %self.locations.descriptor,
            "Transferred delegation package"
        );
        self.descriptor = Some(package.descriptor.clone());
        Ok(())
    }

    /// Idle -> Transferred in one call
    pub fn prepare_and_transfer(&mut self) -> ProtocolResult<&Descriptor> {
        self.prepare()?;
        self.transfer()
    }

    /// Transferred | Computed -> Retrieved: read and decode the result
    pub fn retrieve(&mut self) -> ProtocolResult<&[f64]> {
        self.state.begin(Stage::Retrieve)?;
        let outcome = self.run_retrieve();
        self.state.finish(Stage::Retrieve, outcome)?;
        self.result
            .as_deref()
            .ok_or_else(|| ProtocolError::configuration(Stage::Retrieve, "no result decoded"))
    }

    fn run_retrieve(&mut self) -> ProtocolResult<()> {
        let stage = Stage::Retrieve;
        let (Some(ctx), Some(descriptor)) = (&self.context, &self.descriptor) else {
            return Err(ProtocolError::configuration(stage, "nothing transferred"));
        };
        let location = descriptor
            .result_path()
            .ok_or_else(|| ProtocolError::configuration(stage, "descriptor has no result location"))?;

        let bytes = context::read(&self.medium, stage, &location)?;
        let handle = self
            .engine
            .handle_from_bytes(&bytes)
            .map_err(ProtocolError::engine(stage))?;
        let mut values = self
            .engine
            .decode(ctx, &handle)
            .map_err(ProtocolError::engine(stage))?;
        values.truncate(self.request.declared_length);

        info!(run_id = %self.run_id, location = %location, len = values.len(), "Retrieved result");
        self.result = Some(values);
        Ok(())
    }

    /// Retrieved -> Verified: compare against the (translated) reference.
    ///
    /// Only fails on a wrong-order call; deviations are reported, not judged.
    pub fn verify(&mut self) -> ProtocolResult<VerificationReport> {
        self.state.begin(Stage::Verify)?;
        let result = self.result.as_deref().unwrap_or_default();
        let reference = self
            .translation
            .as_ref()
            .map(|t| t.reference.as_slice())
            .unwrap_or_default();

        if reference.is_empty() {
            warn!(run_id = %self.run_id, "No reference result available, nothing to compare");
        }
        let report = if reference.is_empty() {
            VerificationReport::default()
        } else {
            ResultVerifier::verify(result, reference)
        };

        info!(
            run_id = %self.run_id,
            compared = report.len(),
            max_difference = ?report.max_difference(),
            "Verified result"
        );
        self.state.finish(Stage::Verify, Ok(report))
    }
}

/// Descriptor already on the medium when joining a shared run, if any
fn joined_descriptor<M: HandoffMedium>(medium: &M, location: &str) -> ProtocolResult<Option<Descriptor>> {
    if !medium.exists(location) {
        return Ok(None);
    }
    Descriptor::load(medium, location, Stage::Transfer).map(Some)
}

/// Reference must be empty or exactly the declared length
fn check_reference(stage: Stage, request: &ComputationRequest) -> ProtocolResult<()> {
    let len = request.reference.len();
    if len != 0 && len != request.declared_length {
        return Err(ProtocolError::shape(
            stage,
            format!(
                "reference has {len} elements, declared length is {}",
                request.declared_length
            ),
        ));
    }
    Ok(())
}
