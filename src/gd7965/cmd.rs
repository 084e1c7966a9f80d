/// GD7965 / UC8179 command bytes
pub struct Cmd;
impl Cmd {
    // Init
    pub const PANEL_SETTING: u8 = 0x00;
    pub const POWER_SETTING: u8 = 0x01;
    pub const POWER_OFF: u8 = 0x02;
    pub const POWER_ON: u8 = 0x04;
    pub const BOOSTER_SOFT_START: u8 = 0x06;
    pub const DEEP_SLEEP: u8 = 0x07;
    pub const DUAL_SPI: u8 = 0x15;
    pub const PLL_CONTROL: u8 = 0x30;
    pub const VCOM_DATA_INTERVAL: u8 = 0x50;
    pub const TCON_SETTING: u8 = 0x60;
    pub const RESOLUTION_SETTING: u8 = 0x61;

    // Update
    pub const DATA_START_TRANSMISSION_1: u8 = 0x10;
    pub const DISPLAY_REFRESH: u8 = 0x12;
    pub const DATA_START_TRANSMISSION_2: u8 = 0x13;
    pub const PARTIAL_WINDOW: u8 = 0x90;
    pub const PARTIAL_IN: u8 = 0x91;
    pub const PARTIAL_OUT: u8 = 0x92;
}

/*
Datasheet names:
0x10 - DTM1, old data / black-white RAM (1 = white)
0x13 - DTM2, new data / red RAM (1 = red)
0x90 - Partial Window: HRST[9:3], HRED[9:3] | 0x07, VRST[9:0], VRED[9:0], PT_SCAN
*/
