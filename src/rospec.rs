use serde::{Deserialize, Serialize};

use crate::errors::ReaderError;
use crate::llrp::encoder::ParamWriter;
use crate::llrp::{decoder, message_types, parameter_types};
use crate::message::Message;
use crate::session::Session;


// All antennas: a single entry with id 0.
pub const ANTENNA_ALL: u16 = 0;

// ROSpec current states as the reader reports them.
pub const ROSPEC_STATE_DISABLED: u8 = 0;
pub const ROSPEC_STATE_INACTIVE: u8 = 1;
pub const ROSPEC_STATE_ACTIVE: u8 = 2;

// Start trigger types.
pub const START_TRIGGER_NULL: u8 = 0;
pub const START_TRIGGER_IMMEDIATE: u8 = 1;
pub const START_TRIGGER_PERIODIC: u8 = 2;

// AISpec stop trigger types.
pub const AI_STOP_NULL: u8 = 0;
pub const AI_STOP_DURATION: u8 = 1;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum TagProtocol {
    Gen2,
    Iso180006b,
    Ipx64,
    Ipx256,
}

impl TagProtocol {
    /// AirProtocol id used in InventoryParameterSpec and AccessSpec.
    pub fn protocol_id(&self) -> u8 {
        match self {
            TagProtocol::Gen2 => 1,
            TagProtocol::Iso180006b => 2,
            TagProtocol::Ipx64 => 3,
            TagProtocol::Ipx256 => 4,
        }
    }
}

/// Narrows which tags an operation applies to. Select puts a Gen2
/// select mask on the air; TagData matches the EPC exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TagFilter {
    Gen2Select {
        bank: u8,
        bit_pointer: u16,
        mask: Vec<u8>,
        bit_length: u16,
    },
    TagData {
        epc: Vec<u8>,
    },
}

/// One inventory instruction: which antennas, which protocol, an
/// optional filter, and the vendor fast-search flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimplePlan {
    pub antennas: Vec<u16>,
    pub protocol: TagProtocol,
    pub filter: Option<TagFilter>,
    pub fast_search: bool,
    /// relative share of on-time in a multi plan
    pub weight: u32,
}

impl SimplePlan {
    pub fn new(protocol: TagProtocol) -> SimplePlan {
        SimplePlan {
            antennas: Vec::new(),
            protocol,
            filter: None,
            fast_search: false,
            weight: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ReadPlan {
    Simple(SimplePlan),
    Multi(Vec<SimplePlan>),
}

/// What GET_ROSPECS tells us about one spec on the reader.
#[derive(Clone, Debug)]
pub struct ROSpecSummary {
    pub id: u32,
    pub state: u8,
    pub start_trigger: u8,
}

impl Session {
    pub(crate) fn next_rospec_id(&self) -> u32 {
        let mut output: u32 = 0;
        if let Ok(mut v) = self.rospec_id.lock() {
            output = *v;
            *v += 1;
        }
        output
    }

    /// Builds and adds one ROSpec for the given plan.
    ///
    /// Simple synchronous plans get a null start trigger and a
    /// duration AISpec stop; continuous simple plans run forever until
    /// stopped; multi-plan continuous mode uses a periodic start
    /// trigger with the total on-time as the period so the specs round
    /// robin on the reader itself.
    pub fn add_rospec(
        &self,
        plan: &SimplePlan,
        read_duration_ms: u32,
        continuous: bool,
        periodic_total_ms: Option<u32>,
    ) -> Result<u32, ReaderError> {
        let rospec_id = self.next_rospec_id();
        let phase = match self.capabilities() {
            Some(c) => c.supports_phase_reporting(),
            None => false,
        };
        let body = build_rospec(rospec_id, plan, read_duration_ms, continuous, periodic_total_ms, phase);
        self.command(message_types::ADD_ROSPEC, |id| {
            let mut w = ParamWriter::new();
            w.bytes(&body);
            w.into_message(message_types::ADD_ROSPEC, id)
        })?;
        if let Ok(mut active) = self.active_rospec.lock() {
            *active = Some(rospec_id);
        }
        Ok(rospec_id)
    }

    pub fn enable_rospec(&self, rospec_id: u32) -> Result<(), ReaderError> {
        self.rospec_command(message_types::ENABLE_ROSPEC, rospec_id)
    }

    pub fn disable_rospec(&self, rospec_id: u32) -> Result<(), ReaderError> {
        self.rospec_command(message_types::DISABLE_ROSPEC, rospec_id)
    }

    pub fn start_rospec(&self, rospec_id: u32) -> Result<(), ReaderError> {
        self.rospec_command(message_types::START_ROSPEC, rospec_id)
    }

    pub fn delete_rospec(&self, rospec_id: u32) -> Result<(), ReaderError> {
        self.rospec_command(message_types::DELETE_ROSPEC, rospec_id)
    }

    /// Stops one ROSpec. During continuous-mode teardown the response
    /// handshake can deadlock against the receiver owning the
    /// transport, so callers there pass wait_for_response = false and
    /// fire it blind.
    pub fn stop_rospec(&self, rospec_id: u32, wait_for_response: bool) -> Result<(), ReaderError> {
        if wait_for_response {
            return self.rospec_command(message_types::STOP_ROSPEC, rospec_id)
        }
        self.send(message_types::STOP_ROSPEC, |id| {
            let mut w = ParamWriter::new();
            w.u32(rospec_id);
            w.into_message(message_types::STOP_ROSPEC, id)
        })?;
        Ok(())
    }

    /// Deletes every ROSpec on the reader (id 0 means all).
    pub fn delete_all_rospecs(&self, wait_for_response: bool) -> Result<(), ReaderError> {
        if wait_for_response {
            return self.rospec_command(message_types::DELETE_ROSPEC, 0)
        }
        self.send(message_types::DELETE_ROSPEC, |id| {
            let mut w = ParamWriter::new();
            w.u32(0);
            w.into_message(message_types::DELETE_ROSPEC, id)
        })?;
        Ok(())
    }

    fn rospec_command(&self, kind: u16, rospec_id: u32) -> Result<(), ReaderError> {
        self.command(kind, |id| {
            let mut w = ParamWriter::new();
            w.u32(rospec_id);
            w.into_message(kind, id)
        })?;
        Ok(())
    }

    /// Every ROSpec currently on the reader.
    pub fn get_rospecs(&self) -> Result<Vec<ROSpecSummary>, ReaderError> {
        let response = self.command(message_types::GET_ROSPECS, |id| {
            ParamWriter::new().into_message(message_types::GET_ROSPECS, id)
        })?;
        parse_rospecs(&response)
    }

    /// Sets up and starts reading under the given plan. Synchronous
    /// reads (continuous = false) arm the completion tracker for one
    /// ROSpec-end event before anything starts.
    pub fn start_reading(&self, plan: &ReadPlan, read_duration_ms: u32, continuous: bool) -> Result<(), ReaderError> {
        self.set_continuous(continuous);
        match plan {
            ReadPlan::Simple(simple) => {
                if let Ok(mut multi) = self.multi_plan.lock() {
                    *multi = false;
                }
                let id = self.add_rospec(simple, read_duration_ms, continuous, None)?;
                self.enable_rospec(id)?;
                if !continuous {
                    self.expect_rospec_events(1);
                }
                self.start_rospec(id)?;
            }
            ReadPlan::Multi(plans) => {
                if plans.is_empty() {
                    return Err(ReaderError::InvalidValue(String::from("empty multi read plan")))
                }
                if let Ok(mut multi) = self.multi_plan.lock() {
                    *multi = true;
                }
                let total_weight: u32 = plans.iter().map(|p| p.weight.max(1)).sum();
                for p in plans {
                    let share = read_duration_ms * p.weight.max(1) / total_weight;
                    let id = self.add_rospec(p, share, continuous, Some(read_duration_ms))?;
                    self.enable_rospec(id)?;
                }
                if !continuous {
                    self.expect_rospec_events(plans.len() as u32);
                }
                // periodic triggers fire on their own; no START_ROSPEC
            }
        }
        Ok(())
    }

    /// Stops whatever is being read. Periodic-trigger ROSpecs restart
    /// themselves after STOP_ROSPEC, so multi-plan mode deletes all
    /// specs instead of stopping one.
    pub fn stop_reading(&self) -> Result<(), ReaderError> {
        let continuous = self.is_continuous();
        let multi = match self.multi_plan.lock() {
            Ok(m) => *m,
            Err(_) => false,
        };
        let result = if multi {
            self.delete_all_rospecs(!continuous)
        } else {
            match self.active_rospec.lock() {
                Ok(active) => match *active {
                    Some(id) => self.stop_rospec(id, !continuous),
                    None => Ok(()),
                },
                Err(_) => Ok(()),
            }
        };
        self.set_continuous(false);
        result
    }

    /// Clears reader state a previous session may have left behind:
    /// stops anything Active, disables anything that would restart on
    /// a periodic trigger.
    pub fn stop_active_rospecs(&self) -> Result<(), ReaderError> {
        let specs = self.get_rospecs()?;
        for spec in specs {
            if spec.state == ROSPEC_STATE_ACTIVE {
                self.stop_rospec(spec.id, true)?;
            }
            if spec.start_trigger == START_TRIGGER_PERIODIC {
                self.disable_rospec(spec.id)?;
            }
        }
        Ok(())
    }
}

/// Encodes the full ROSpec parameter tree for a plan.
pub fn build_rospec(
    rospec_id: u32,
    plan: &SimplePlan,
    read_duration_ms: u32,
    continuous: bool,
    periodic_total_ms: Option<u32>,
    phase_reporting: bool,
) -> Vec<u8> {
    let mut w = ParamWriter::new();
    w.begin_param(parameter_types::RO_SPEC);
    w.u32(rospec_id);
    w.u8(0); // priority 0-7, lower is higher
    w.u8(ROSPEC_STATE_DISABLED);

    w.begin_param(parameter_types::RO_BOUNDARY_SPEC);
    w.begin_param(parameter_types::RO_SPEC_START_TRIGGER);
    match periodic_total_ms {
        Some(total) => {
            w.u8(START_TRIGGER_PERIODIC);
            w.begin_param(parameter_types::PERIODIC_TRIGGER_VALUE)
                .u32(0) // offset
                .u32(total)
                .end_param();
        }
        None => {
            w.u8(START_TRIGGER_NULL);
        }
    }
    w.end_param();
    w.begin_param(parameter_types::RO_SPEC_STOP_TRIGGER)
        .u8(0) // null; the AISpec stop drives the lifetime
        .u32(0)
        .end_param();
    w.end_param();

    w.begin_param(parameter_types::AI_SPEC);
    if plan.antennas.is_empty() {
        w.u16(1);
        w.u16(ANTENNA_ALL);
    } else {
        w.u16(plan.antennas.len() as u16);
        for a in &plan.antennas {
            w.u16(*a);
        }
    }
    w.begin_param(parameter_types::AI_SPEC_STOP_TRIGGER);
    if continuous && periodic_total_ms.is_none() {
        // run until stopped from outside
        w.u8(AI_STOP_NULL).u32(0);
    } else {
        w.u8(AI_STOP_DURATION).u32(read_duration_ms);
    }
    w.end_param();
    w.begin_param(parameter_types::INVENTORY_PARAMETER_SPEC);
    w.u16(1); // inventory parameter spec id
    w.u8(plan.protocol.protocol_id());
    if plan.filter.is_some() || plan.fast_search {
        w.begin_param(parameter_types::ANTENNA_CONFIGURATION);
        w.u16(ANTENNA_ALL);
        w.begin_param(parameter_types::C1G2_INVENTORY_COMMAND);
        w.u8(0); // state aware: no
        if let Some(filter) = &plan.filter {
            write_c1g2_filter(&mut w, filter);
        }
        if plan.fast_search {
            w.begin_custom(parameter_types::TM_FAST_SEARCH_MODE)
                .u8(1)
                .end_param();
        }
        w.end_param();
        w.end_param();
    }
    w.end_param();
    w.end_param();

    w.begin_param(parameter_types::RO_REPORT_SPEC);
    if continuous {
        // report every tag as it is seen
        w.u8(2);
        w.u16(1);
    } else {
        // report only at end of rospec
        w.u8(1);
        w.u16(0);
    }
    w.begin_param(parameter_types::TAG_REPORT_CONTENT_SELECTOR);
    // rospec id, antenna id, peak rssi, first seen utc, tag seen count
    w.u16(0x9680);
    w.begin_param(parameter_types::C1G2_EPC_MEMORY_SELECTOR)
        .u8(0xC0) // crc and pc bits
        .end_param();
    w.end_param();
    if phase_reporting {
        w.begin_custom(parameter_types::TM_TAG_REPORT_CONTENT_SELECTOR)
            .u16(0x1000) // phase angle
            .end_param();
    }
    w.end_param();

    w.end_param();
    w.into_bytes()
}

fn write_c1g2_filter(w: &mut ParamWriter, filter: &TagFilter) {
    w.begin_param(parameter_types::C1G2_FILTER);
    w.u8(0); // truncate: do not truncate
    match filter {
        TagFilter::Gen2Select { bank, bit_pointer, mask, bit_length } => {
            w.begin_param(parameter_types::C1G2_TAG_INVENTORY_MASK);
            w.u8((bank & 0x03) << 6);
            w.u16(*bit_pointer);
            w.u16(*bit_length);
            w.bytes(mask);
            w.end_param();
        }
        TagFilter::TagData { epc } => {
            // exact match on EPC memory, past the crc and pc words
            w.begin_param(parameter_types::C1G2_TAG_INVENTORY_MASK);
            w.u8(1 << 6);
            w.u16(32);
            w.u16((epc.len() * 8) as u16);
            w.bytes(epc);
            w.end_param();
        }
    }
    w.begin_param(parameter_types::C1G2_TAG_INVENTORY_STATE_UNAWARE_FILTER_ACTION)
        .u8(0) // select matching, unselect the rest
        .end_param();
    w.end_param();
}

fn parse_rospecs(response: &Message) -> Result<Vec<ROSpecSummary>, ReaderError> {
    let mut specs = Vec::new();
    for p in decoder::params(&response.body) {
        let p = p.map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        if p.kind != parameter_types::RO_SPEC {
            continue;
        }
        let id = decoder::read_u32(p.value, 0).map_err(|e| ReaderError::MessageParse(String::from(e)))?;
        if p.value.len() < 6 {
            return Err(ReaderError::MessageParse(String::from("rospec parameter truncated")))
        }
        let state = p.value[5];
        let mut start_trigger = START_TRIGGER_NULL;
        if let Some(boundary) = decoder::find_param(&p.value[6..], parameter_types::RO_BOUNDARY_SPEC) {
            if let Some(start) = decoder::find_param(boundary.value, parameter_types::RO_SPEC_START_TRIGGER) {
                if !start.value.is_empty() {
                    start_trigger = start.value[0];
                }
            }
        }
        specs.push(ROSpecSummary { id, state, start_trigger });
    }
    Ok(specs)
}
