/// Parameter values for the GD7965 commands in [`super::cmd::Cmd`].
pub struct Flag;
impl Flag {
    // Power Setting (0x01): border LDO off, internal VGH/VGL, VDH/VDL +-15V
    pub const POWER_SETTING: [u8; 4] = [0x07, 0x07, 0x3F, 0x3F];

    // Booster Soft Start (0x06) phases A, B, C and duration
    pub const BOOSTER_SOFT_START: [u8; 4] = [0x17, 0x17, 0x28, 0x17];

    // Panel Setting (0x00): KW/R mode, LUT from OTP, scan up, shift right, booster on, no reset
    pub const PANEL_SETTING_KWR: u8 = 0x0F;

    // PLL (0x30): 50 Hz frame rate
    pub const PLL_50HZ: u8 = 0x06;

    // Dual SPI (0x15)
    pub const DUAL_SPI_OFF: u8 = 0x00;

    // VCOM and Data Interval (0x50): white border, default data interval
    pub const VCOM_WHITE_BORDER: [u8; 2] = [0x11, 0x07];

    // TCON (0x60): source to gate and gate to source non-overlap
    pub const TCON_DEFAULT: u8 = 0x22;

    // Partial Window (0x90) last byte: scan inside and outside the window
    pub const PARTIAL_SCAN_ALL: u8 = 0x01;

    // Deep Sleep (0x07) check code
    pub const DEEP_SLEEP_CHECK: u8 = 0xA5;

    // Data fill values
    pub const DTM1_WHITE: u8 = 0xFF;
    pub const DTM2_NO_RED: u8 = 0x00;
}
