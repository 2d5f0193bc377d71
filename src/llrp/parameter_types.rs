// General Parameters
pub const UTC_TIMESTAMP: u16 = 128;
pub const UPTIME: u16 = 129;

// Reader Device Capabilities
pub const GENERAL_DEVICE_CAPABILITIES: u16 = 137;
pub const RECEIVE_SENSITIVITY_TABLE_ENTRY: u16 = 139;
pub const PER_ANTENNA_AIR_PROTOCOL: u16 = 140;
pub const GPIO_CAPABILITIES: u16 = 141;
pub const LLRP_CAPABILITIES: u16 = 142;
pub const REGULATORY_CAPABILITIES: u16 = 143;
pub const UHF_BAND_CAPABILITIES: u16 = 144;
pub const TRANSMIT_POWER_LEVEL_TABLE_ENTRY: u16 = 145;
pub const FREQUENCY_INFORMATION: u16 = 146;
pub const FREQUENCY_HOP_TABLE: u16 = 147;
pub const FIXED_FREQUENCY_TABLE: u16 = 148;

// Reader Operation Parameters
pub const RO_SPEC: u16 = 177;
pub const RO_BOUNDARY_SPEC: u16 = 178;
pub const RO_SPEC_START_TRIGGER: u16 = 179;
pub const PERIODIC_TRIGGER_VALUE: u16 = 180;
pub const GPI_TRIGGER_VALUE: u16 = 181;
pub const RO_SPEC_STOP_TRIGGER: u16 = 182;
pub const AI_SPEC: u16 = 183;
pub const AI_SPEC_STOP_TRIGGER: u16 = 184;
pub const TAG_OBSERVATION_TRIGGER: u16 = 185;
pub const INVENTORY_PARAMETER_SPEC: u16 = 186;

// Access Operation Parameters
pub const ACCESS_SPEC: u16 = 207;
pub const ACCESS_SPEC_STOP_TRIGGER: u16 = 208;
pub const ACCESS_COMMAND: u16 = 209;

// Configuration Parameters
pub const IDENTIFICATION: u16 = 218;
pub const GPO_WRITE_DATA: u16 = 219;
pub const KEEPALIVE_SPEC: u16 = 220;
pub const ANTENNA_PROPERTIES: u16 = 221;
pub const ANTENNA_CONFIGURATION: u16 = 222;
pub const RF_RECEIVER: u16 = 223;
pub const RF_TRANSMITTER: u16 = 224;
pub const GPI_PORT_CURRENT_STATE: u16 = 225;
pub const EVENTS_AND_REPORTS: u16 = 226;

// Reporting Parameters
pub const RO_REPORT_SPEC: u16 = 237;
pub const TAG_REPORT_CONTENT_SELECTOR: u16 = 238;
pub const ACCESS_REPORT_SPEC: u16 = 239;
pub const TAG_REPORT_DATA: u16 = 240;
pub const EPC_DATA: u16 = 241;

// TV Encodings (first bit 1, bits 2-8 are type)
pub const EPC_96: u16 = 13;
pub const RO_SPEC_ID: u16 = 9;
pub const SPEC_INDEX: u16 = 14;
pub const INVENTORY_PARAMETER_SPEC_ID: u16 = 10;
pub const ANTENNA_ID: u16 = 1;
pub const PEAK_RSSI: u16 = 6;
pub const CHANNEL_INDEX: u16 = 7;
pub const FIRST_SEEN_TIMESTAMP_UTC: u16 = 2;
pub const FIRST_SEEN_TIMESTAMP_UPTIME: u16 = 3;
pub const LAST_SEEN_TIMESTAMP_UTC: u16 = 4;
pub const LAST_SEEN_TIMESTAMP_UPTIME: u16 = 5;
pub const TAG_SEEN_COUNT: u16 = 8;
pub const ACCESS_SPEC_ID: u16 = 16;

// Event Parameters
pub const READER_EVENT_NOTIFICATION_SPEC: u16 = 244;
pub const EVENT_NOTIFICATION_STATE: u16 = 245;
pub const READER_EVENT_NOTIFICATION_DATA: u16 = 246;
pub const HOPPING_EVENT: u16 = 247;
pub const GPI_EVENT: u16 = 248;
pub const RO_SPEC_EVENT: u16 = 249;
pub const REPORT_BUFFER_LEVEL_WARNING_EVENT: u16 = 250;
pub const REPORT_BUFFER_OVERFLOW_ERROR_EVENT: u16 = 251;
pub const READER_EXCEPTION_EVENT: u16 = 252;
pub const AI_SPEC_EVENT: u16 = 254;
pub const ANTENNA_EVENT: u16 = 255;
pub const CONNECTION_ATTEMPT_EVENT: u16 = 256;
pub const CONNECTION_CLOSE_EVENT: u16 = 257;

// LLRP Error Parameters
pub const LLRP_STATUS: u16 = 287;
pub const FIELD_ERROR: u16 = 288;
pub const PARAMETER_ERROR: u16 = 289;
pub const CUSTOM_PARAMETER: u16 = 1023;

// Class-1 Generation-2 (C1G2) Protocol Parameters
pub const C1G2_LLRP_CAPABILITIES: u16 = 327;
pub const C1G2_UHF_MODE_TABLE: u16 = 328;
pub const C1G2_UHF_MODE_TABLE_ENTRY: u16 = 329;
pub const C1G2_INVENTORY_COMMAND: u16 = 330;
pub const C1G2_FILTER: u16 = 331;
pub const C1G2_TAG_INVENTORY_MASK: u16 = 332;
pub const C1G2_TAG_INVENTORY_STATE_UNAWARE_FILTER_ACTION: u16 = 334;
pub const C1G2_RF_CONTROL: u16 = 335;
pub const C1G2_SINGULATION_CONTROL: u16 = 336;

// C1G2 Access Operation Parameters
pub const C1G2_TAG_SPEC: u16 = 338;
pub const C1G2_TARGET_TAG: u16 = 339;
pub const C1G2_READ: u16 = 341;
pub const C1G2_WRITE: u16 = 342;
pub const C1G2_KILL: u16 = 343;
pub const C1G2_LOCK: u16 = 344;
pub const C1G2_LOCK_PAYLOAD: u16 = 345;
pub const C1G2_BLOCK_ERASE: u16 = 346;
pub const C1G2_BLOCK_WRITE: u16 = 347;
pub const C1G2_BLOCK_PERMALOCK: u16 = 358;
pub const C1G2_GET_BLOCK_PERMALOCK_STATUS: u16 = 359;

// C1G2 Reporting Parameters
pub const C1G2_EPC_MEMORY_SELECTOR: u16 = 348;

// C1G2 TV-Encodings
pub const C1G2_PC: u16 = 12;
pub const C1G2_XPCW1: u16 = 19;
pub const C1G2_XPCW2: u16 = 20;
pub const C1G2_CRC: u16 = 11;
pub const C1G2_SINGULATION_DETAILS: u16 = 18;

// C1G2 OpSpec Results
pub const C1G2_READ_OP_SPEC_RESULT: u16 = 349;
pub const C1G2_WRITE_OP_SPEC_RESULT: u16 = 350;
pub const C1G2_KILL_OP_SPEC_RESULT: u16 = 351;
pub const C1G2_LOCK_OP_SPEC_RESULT: u16 = 352;
pub const C1G2_BLOCK_ERASE_OP_SPEC_RESULT: u16 = 353;
pub const C1G2_BLOCK_WRITE_OP_SPEC_RESULT: u16 = 354;
pub const C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT: u16 = 361;
pub const C1G2_GET_BLOCK_PERMALOCK_STATUS_OP_SPEC_RESULT: u16 = 362;

// ThingMagic custom parameter subtypes, sent inside a CUSTOM_PARAMETER
// with the ThingMagic vendor id. Only the ones the session layer uses.
pub const TM_FAST_SEARCH_MODE: u32 = 232;
pub const TM_TAG_REPORT_CONTENT_SELECTOR: u32 = 230;
pub const TM_ISO_180006B_INVENTORY_COMMAND: u32 = 23;
pub const TM_ISO_180006B_TAG_PATTERN: u32 = 24;
pub const TM_ISO_180006B_READ: u32 = 41;
pub const TM_ISO_180006B_WRITE: u32 = 42;
pub const TM_ISO_180006B_LOCK: u32 = 43;
pub const TM_ISO_180006B_READ_OP_SPEC_RESULT: u32 = 51;
pub const TM_ISO_180006B_WRITE_OP_SPEC_RESULT: u32 = 52;
pub const TM_ISO_180006B_LOCK_OP_SPEC_RESULT: u32 = 53;

// LLRP Status Codes
pub const M_SUCCESS: u16 = 0;
pub const M_PARAMETER_ERROR: u16 = 100;
pub const M_FIELD_ERROR: u16 = 101;
pub const M_UNEXPECTED_PARAMETER: u16 = 102;
pub const M_MISSING_PARAMETER: u16 = 103;
pub const M_DUPLICATE_PARAMETER: u16 = 104;
pub const M_OVERFLOW_PARAMETER: u16 = 105;
pub const M_OVERFLOW_FIELD: u16 = 106;
pub const M_UNKNOWN_PARAMETER: u16 = 107;
pub const M_UNKNOWN_FIELD: u16 = 108;
pub const M_UNSUPPORTED_MESSAGE: u16 = 109;
pub const M_UNSUPPORTED_VERSION: u16 = 110;
pub const M_UNSUPPORTED_PARAMETER: u16 = 111;
pub const M_UNEXPECTED_MESSAGE: u16 = 112;
pub const P_PARAMETER_ERROR: u16 = 200;
pub const P_FIELD_ERROR: u16 = 201;
pub const P_UNEXPECTED_PARAMETER: u16 = 202;
pub const P_MISSING_PARAMETER: u16 = 203;
pub const P_DUPLICATE_PARAMETER: u16 = 204;
pub const P_OVERFLOW_PARAMETER: u16 = 205;
pub const P_OVERFLOW_FIELD: u16 = 206;
pub const P_UNKNOWN_PARAMETER: u16 = 207;
pub const P_UNKNOWN_FIELD: u16 = 208;
pub const P_UNSUPPORTED_PARAMETER: u16 = 209;
pub const A_INVALID: u16 = 300;
pub const A_OUT_OF_RANGE: u16 = 301;
pub const R_DEVICE_ERROR: u16 = 401;

pub fn get_llrp_status_name(kind: u16) -> Option<&'static str> {
    match kind {
        0 => Some("M_SUCCESS"),
        100 => Some("M_PARAMETER_ERROR"),
        101 => Some("M_FIELD_ERROR"),
        102 => Some("M_UNEXPECTED_PARAMETER"),
        103 => Some("M_MISSING_PARAMETER"),
        104 => Some("M_DUPLICATE_PARAMETER"),
        105 => Some("M_OVERFLOW_PARAMETER"),
        106 => Some("M_OVERFLOW_FIELD"),
        107 => Some("M_UNKNOWN_PARAMETER"),
        108 => Some("M_UNKNOWN_FIELD"),
        109 => Some("M_UNSUPPORTED_MESSAGE"),
        110 => Some("M_UNSUPPORTED_VERSION"),
        111 => Some("M_UNSUPPORTED_PARAMETER"),
        112 => Some("M_UNEXPECTED_MESSAGE"),
        200 => Some("P_PARAMETER_ERROR"),
        201 => Some("P_FIELD_ERROR"),
        202 => Some("P_UNEXPECTED_PARAMETER"),
        203 => Some("P_MISSING_PARAMETER"),
        204 => Some("P_DUPLICATE_PARAMETER"),
        205 => Some("P_OVERFLOW_PARAMETER"),
        206 => Some("P_OVERFLOW_FIELD"),
        207 => Some("P_UNKNOWN_PARAMETER"),
        208 => Some("P_UNKNOWN_FIELD"),
        209 => Some("P_UNSUPPORTED_PARAMETER"),
        300 => Some("A_INVALID"),
        301 => Some("A_OUT_OF_RANGE"),
        401 => Some("R_DEVICE_ERROR"),
        _ => None,
    }
}
