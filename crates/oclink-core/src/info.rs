// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Info selectors for the two-call query pattern (`clGet*Info`).

pub mod platform {
    pub const PROFILE: u32 = 0x0900;
    pub const VERSION: u32 = 0x0901;
    pub const NAME: u32 = 0x0902;
    pub const VENDOR: u32 = 0x0903;
    pub const EXTENSIONS: u32 = 0x0904;
}

pub mod device {
    pub const TYPE: u32 = 0x1000;
    pub const MAX_COMPUTE_UNITS: u32 = 0x1002;
    pub const MAX_WORK_GROUP_SIZE: u32 = 0x1004;
    pub const GLOBAL_MEM_SIZE: u32 = 0x101F;
    pub const NAME: u32 = 0x102B;
    pub const VENDOR: u32 = 0x102C;
    pub const DRIVER_VERSION: u32 = 0x102D;
    pub const VERSION: u32 = 0x102F;
    pub const EXTENSIONS: u32 = 0x1030;
    pub const PLATFORM: u32 = 0x1031;
    pub const PARENT_DEVICE: u32 = 0x1042;
    pub const PARTITION_MAX_SUB_DEVICES: u32 = 0x1043;
    pub const REFERENCE_COUNT: u32 = 0x1047;
}

pub mod context {
    pub const REFERENCE_COUNT: u32 = 0x1080;
    pub const DEVICES: u32 = 0x1081;
    pub const PROPERTIES: u32 = 0x1082;
    pub const NUM_DEVICES: u32 = 0x1083;
}

pub mod queue {
    pub const CONTEXT: u32 = 0x1090;
    pub const DEVICE: u32 = 0x1091;
    pub const REFERENCE_COUNT: u32 = 0x1092;
    pub const PROPERTIES: u32 = 0x1093;
}

pub mod memory {
    pub const TYPE: u32 = 0x1100;
    pub const FLAGS: u32 = 0x1101;
    pub const SIZE: u32 = 0x1102;
    pub const HOST_PTR: u32 = 0x1103;
    pub const MAP_COUNT: u32 = 0x1104;
    pub const REFERENCE_COUNT: u32 = 0x1105;
    pub const CONTEXT: u32 = 0x1106;
    pub const ASSOCIATED_MEMOBJECT: u32 = 0x1107;
    pub const OFFSET: u32 = 0x1108;
}

pub mod image {
    pub const FORMAT: u32 = 0x1110;
    pub const ELEMENT_SIZE: u32 = 0x1111;
    pub const ROW_PITCH: u32 = 0x1112;
    pub const WIDTH: u32 = 0x1114;
    pub const HEIGHT: u32 = 0x1115;
    pub const DEPTH: u32 = 0x1116;
}

pub mod pipe {
    pub const PACKET_SIZE: u32 = 0x1120;
    pub const MAX_PACKETS: u32 = 0x1121;
}

pub mod sampler {
    pub const REFERENCE_COUNT: u32 = 0x1150;
    pub const CONTEXT: u32 = 0x1151;
    pub const NORMALIZED_COORDS: u32 = 0x1152;
    pub const ADDRESSING_MODE: u32 = 0x1153;
    pub const FILTER_MODE: u32 = 0x1154;
}

pub mod program {
    pub const REFERENCE_COUNT: u32 = 0x1160;
    pub const CONTEXT: u32 = 0x1161;
    pub const NUM_DEVICES: u32 = 0x1162;
    pub const DEVICES: u32 = 0x1163;
    pub const SOURCE: u32 = 0x1164;
    pub const BINARY_SIZES: u32 = 0x1165;
    pub const BINARIES: u32 = 0x1166;
    pub const KERNEL_NAMES: u32 = 0x1168;
}

pub mod build {
    pub const STATUS: u32 = 0x1181;
    pub const OPTIONS: u32 = 0x1182;
    pub const LOG: u32 = 0x1183;
}

pub mod kernel {
    pub const FUNCTION_NAME: u32 = 0x1190;
    pub const NUM_ARGS: u32 = 0x1191;
    pub const REFERENCE_COUNT: u32 = 0x1192;
    pub const CONTEXT: u32 = 0x1193;
    pub const PROGRAM: u32 = 0x1194;
}

pub mod kernel_arg {
    pub const ADDRESS_QUALIFIER: u32 = 0x1196;
    pub const ACCESS_QUALIFIER: u32 = 0x1197;
    pub const TYPE_NAME: u32 = 0x1198;
    pub const TYPE_QUALIFIER: u32 = 0x1199;
    pub const NAME: u32 = 0x119A;
}

pub mod work_group {
    pub const WORK_GROUP_SIZE: u32 = 0x11B0;
    pub const COMPILE_WORK_GROUP_SIZE: u32 = 0x11B1;
    pub const LOCAL_MEM_SIZE: u32 = 0x11B2;
}

pub mod event {
    pub const COMMAND_QUEUE: u32 = 0x11D0;
    pub const COMMAND_TYPE: u32 = 0x11D1;
    pub const REFERENCE_COUNT: u32 = 0x11D2;
    pub const COMMAND_EXECUTION_STATUS: u32 = 0x11D3;
    pub const CONTEXT: u32 = 0x11D4;
}

pub mod profiling {
    pub const QUEUED: u32 = 0x1280;
    pub const SUBMIT: u32 = 0x1281;
    pub const START: u32 = 0x1282;
    pub const END: u32 = 0x1283;
}
