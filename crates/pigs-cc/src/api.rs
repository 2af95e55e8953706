//! The VM API surface: C names of the script commands, their opcode
//! mnemonics, and the built-in header that is logically prepended to every
//! translation unit.

/// Constant-argument translation applied by some commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMapping {
    /// `gpioSetMode` mode argument: `0..7` become `R W 5 4 0 1 2 3`.
    GpioMode,
    /// `gpioSetPullUpDown` pud argument: `0..2` become `O D U`.
    GpioPud,
}

impl ArgMapping {
    /// Map an in-range constant to its letter operand. Out-of-range values
    /// pass through as numbers and are left for the VM to reject.
    pub fn map(self, value: i32) -> Option<char> {
        let letters: &[u8] = match self {
            ArgMapping::GpioMode => b"RW540123",
            ArgMapping::GpioPud => b"ODU",
        };
        usize::try_from(value).ok().and_then(|i| letters.get(i)).map(|b| *b as char)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApiSpec {
    pub c_name: &'static str,
    pub mnemonic: &'static str,
    /// Which argument, if any, is translated to a letter operand. Such an
    /// argument must be a compile-time constant.
    pub arg_map: Option<(usize, ArgMapping)>,
}

pub fn lookup(c_name: &str) -> Option<&'static ApiSpec> {
    API_FUNCTIONS.iter().find(|spec| spec.c_name == c_name)
}

macro_rules! api {
    ($c_name:literal => $mnemonic:literal) => {
        ApiSpec { c_name: $c_name, mnemonic: $mnemonic, arg_map: None }
    };
    ($c_name:literal => $mnemonic:literal, map $idx:literal $mapping:ident) => {
        ApiSpec {
            c_name: $c_name,
            mnemonic: $mnemonic,
            arg_map: Some(($idx, ArgMapping::$mapping)),
        }
    };
}

/// Every script command the VM exposes, keyed by its C wrapper name.
pub static API_FUNCTIONS: &[ApiSpec] = &[
    // Basic commands
    api!("gpioSetMode" => "MODES", map 1 GpioMode),
    api!("gpioGetMode" => "MODEG"),
    api!("gpioSetPullUpDown" => "PUD", map 1 GpioPud),
    api!("gpioRead" => "READ"),
    api!("gpioWrite" => "WRITE"),
    // PWM commands
    api!("gpioPWM" => "PWM"),
    api!("gpioSetPWMfrequency" => "PFS"),
    api!("gpioSetPWMrange" => "PRS"),
    api!("gpioGetPWMdutycycle" => "GDC"),
    api!("gpioGetPWMfrequency" => "PFG"),
    api!("gpioGetPWMrange" => "PRG"),
    api!("gpioGetPWMrealRange" => "PRRG"),
    // Servo commands
    api!("gpioServo" => "SERVO"),
    api!("gpioGetServoPulsewidth" => "GPW"),
    // Intermediate commands
    api!("gpioTrigger" => "TRIG"),
    api!("gpioSetWatchdog" => "WDOG"),
    api!("gpioRead_Bits_0_31" => "BR1"),
    api!("gpioRead_Bits_32_53" => "BR2"),
    api!("gpioWrite_Bits_0_31_Clear" => "BC1"),
    api!("gpioWrite_Bits_32_53_Clear" => "BC2"),
    api!("gpioWrite_Bits_0_31_Set" => "BS1"),
    api!("gpioWrite_Bits_32_53_Set" => "BS2"),
    // Advanced commands
    api!("gpioNotifyOpen" => "NO"),
    api!("gpioNotifyClose" => "NC"),
    api!("gpioNotifyBegin" => "NB"),
    api!("gpioNotifyPause" => "NP"),
    api!("gpioHardwareClock" => "HC"),
    api!("gpioHardwarePWM" => "HP"),
    api!("gpioGlitchFilter" => "FG"),
    api!("gpioNoiseFilter" => "FN"),
    api!("gpioSetPad" => "PADS"),
    api!("gpioGetPad" => "PADG"),
    // Event commands
    api!("eventMonitor" => "EVM"),
    api!("eventTrigger" => "EVT"),
    // I2C commands
    api!("i2cOpen" => "I2CO"),
    api!("i2cClose" => "I2CC"),
    api!("i2cWriteQuick" => "I2CWQ"),
    api!("i2cReadByte" => "I2CRS"),
    api!("i2cWriteByte" => "I2CWS"),
    api!("i2cReadByteData" => "I2CRB"),
    api!("i2cWriteByteData" => "I2CWB"),
    api!("i2cReadWordData" => "I2CRW"),
    api!("i2cWriteWordData" => "I2CWW"),
    api!("i2cProcessCall" => "I2CPC"),
    // Utility commands
    api!("gpioHardwareRevision" => "HWVER"),
    api!("gpioDelay_us" => "MICS"),
    api!("gpioDelay_ms" => "MILS"),
    api!("gpioVersion" => "PIGPV"),
    api!("gpioTick" => "TICK"),
    // Configuration commands
    api!("gpioCfgGetInternals" => "CGI"),
    api!("gpioCfgSetInternals" => "CSI"),
    // Script-exclusive commands
    api!("gpioWait" => "WAIT"),
    api!("eventWait" => "EVTWT"),
    api!("exit" => "HALT"),
];

pub const API_HEADER_NAME: &str = "vm_api.h";

/// The built-in API header. Compiled ahead of the user sources unless one
/// of them is itself named `vm_api.h`.
pub const API_HEADER: &str = r"// vm_api.h
// VM parameter variables and script command prototypes.

extern int p0; extern int p1; extern int p2; extern int p3; extern int p4;
extern int p5; extern int p6; extern int p7; extern int p8; extern int p9;

enum {
    PI_INPUT  = 0,
    PI_OUTPUT = 1,
    PI_ALT5   = 2,
    PI_ALT4   = 3,
    PI_ALT0   = 4,
    PI_ALT1   = 5,
    PI_ALT2   = 6,
    PI_ALT3   = 7
};

enum { PI_PUD_OFF = 0, PI_PUD_DOWN = 1, PI_PUD_UP = 2 };
enum { PI_LOW = 0, PI_HIGH = 1 };
enum { PI_OFF = 0, PI_ON = 1 };
enum { PI_TIMEOUT = 2 };
enum { PI_INIT_FAILED = -1 };

extern void exit(void);

extern void gpioSetMode(unsigned gpio, unsigned mode);
extern int  gpioGetMode(unsigned gpio);
extern void gpioSetPullUpDown(unsigned gpio, unsigned pud);
extern int  gpioRead(unsigned gpio);
extern void gpioWrite(unsigned gpio, unsigned level);

extern void gpioPWM(unsigned gpio, unsigned dutycycle);
extern int  gpioSetPWMfrequency(unsigned gpio, unsigned frequency);
extern int  gpioSetPWMrange(unsigned gpio, unsigned range);
extern int  gpioGetPWMdutycycle(unsigned gpio);
extern int  gpioGetPWMfrequency(unsigned gpio);
extern int  gpioGetPWMrange(unsigned gpio);
extern int  gpioGetPWMrealRange(unsigned gpio);

extern void gpioServo(unsigned gpio, unsigned pulsewidth);
extern int  gpioGetServoPulsewidth(unsigned gpio);

extern void gpioTrigger(unsigned gpio, unsigned pulse_len, unsigned level);
extern void gpioSetWatchdog(unsigned gpio, unsigned timeout);
extern int  gpioRead_Bits_0_31(void);
extern int  gpioRead_Bits_32_53(void);
extern void gpioWrite_Bits_0_31_Clear(unsigned bits);
extern void gpioWrite_Bits_32_53_Clear(unsigned bits);
extern void gpioWrite_Bits_0_31_Set(unsigned bits);
extern void gpioWrite_Bits_32_53_Set(unsigned bits);

extern int  gpioNotifyOpen(void);
extern void gpioNotifyClose(unsigned handle);
extern void gpioNotifyBegin(unsigned handle, unsigned bits);
extern void gpioNotifyPause(unsigned handle);
extern void gpioHardwareClock(unsigned gpio, unsigned frequency);
extern void gpioHardwarePWM(unsigned gpio, unsigned frequency, unsigned dutycycle);
extern void gpioGlitchFilter(unsigned gpio, unsigned steady);
extern void gpioNoiseFilter(unsigned gpio, unsigned steady, unsigned active);
extern void gpioSetPad(unsigned pad, unsigned strength);
extern int  gpioGetPad(unsigned pad);

extern void eventMonitor(unsigned handle, unsigned bits);
extern void eventTrigger(unsigned event);

extern int  i2cOpen(unsigned bus, unsigned address, unsigned flags);
extern void i2cClose(unsigned handle);
extern void i2cWriteQuick(unsigned handle, unsigned bit);
extern int  i2cReadByte(unsigned handle);
extern void i2cWriteByte(unsigned handle, unsigned value);
extern int  i2cReadByteData(unsigned handle, unsigned reg);
extern void i2cWriteByteData(unsigned handle, unsigned reg, unsigned value);
extern int  i2cReadWordData(unsigned handle, unsigned reg);
extern void i2cWriteWordData(unsigned handle, unsigned reg, unsigned value);
extern int  i2cProcessCall(unsigned handle, unsigned reg, unsigned value);

extern int  gpioHardwareRevision(void);
extern void gpioDelay_us(unsigned micros);
extern void gpioDelay_ms(unsigned millis);
extern int  gpioVersion(void);
extern int  gpioTick(void);

extern int  gpioCfgGetInternals(void);
extern void gpioCfgSetInternals(unsigned value);

extern int  gpioWait(unsigned bits);
extern int  eventWait(unsigned bits, unsigned timeout);
";
