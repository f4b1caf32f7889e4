use bridge_core::Key;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(Key),
    Speed(u8),
    Servo(u8),
    Brightness(u8),
    Nixie(bool),
    Led(bool),
    Trace(bool),
    Ultrasonic(bool),
    Th(bool),
    /// Connect to the given address, or the one from the command line.
    Connect(Option<String>),
    Close,
    Chart,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
keys:     w/a/s/d drive, space or b brakes, q/e turn the servo
settings: speed <0-100>, servo <0-180>, bright <1-7>
toggles:  nixie|led|trace|sonic|th on|off
session:  connect [host:port], close, status, chart, quit";

pub fn parse(line: &str) -> Result<Action, String> {
    // a bare space is the brake key, so only trim the newline first
    let line = line.trim_end_matches(['\r', '\n']);
    if line == " " {
        return Ok(Action::Key(Key::Navigate(model::Direction::Brake)));
    }
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty input".into());
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for `{head}`"));
    }

    let mut chars = head.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(key) = Key::from_char(c) {
            return Ok(Action::Key(key));
        }
    }

    match head.to_ascii_lowercase().as_str() {
        "b" | "brake" => Ok(Action::Key(Key::Navigate(model::Direction::Brake))),
        "speed" => number(head, arg).map(Action::Speed),
        "servo" => number(head, arg).map(Action::Servo),
        "bright" | "brightness" => number(head, arg).map(Action::Brightness),
        "nixie" => switch(head, arg).map(Action::Nixie),
        "led" => switch(head, arg).map(Action::Led),
        "trace" => switch(head, arg).map(Action::Trace),
        "sonic" | "ultrasonic" => switch(head, arg).map(Action::Ultrasonic),
        "th" => switch(head, arg).map(Action::Th),
        "connect" => Ok(Action::Connect(arg.map(str::to_owned))),
        "close" => Ok(Action::Close),
        "chart" => Ok(Action::Chart),
        "status" => Ok(Action::Status),
        "help" | "?" => Ok(Action::Help),
        "quit" | "exit" => Ok(Action::Quit),
        other => Err(format!("unknown command `{other}`, try `help`")),
    }
}

fn number(cmd: &str, arg: Option<&str>) -> Result<u8, String> {
    let arg = arg.ok_or_else(|| format!("`{cmd}` needs a value"))?;
    arg.parse().map_err(|_| format!("`{arg}` is not a number between 0 and 255"))
}

fn switch(cmd: &str, arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on") | Some("1") => Ok(true),
        Some("off") | Some("0") => Ok(false),
        _ => Err(format!("`{cmd}` takes on or off")),
    }
}
