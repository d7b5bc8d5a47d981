use std::{
    io::{IsTerminal, Write},
    time::Duration,
};
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

pub(crate) fn print_running(text: &str) {
    print_colourful_prefix("Running", Color::Green, text)
}

pub(crate) fn print_analyzing(text: &str) {
    print_colourful_prefix("Analyzing", Color::Magenta, text)
}

pub(crate) fn print_analyzed(duration: Duration) {
    print_colourful_prefix(
        "Analyzed",
        Color::Green,
        &format!("in {:.2}s", duration.as_secs_f32()),
    )
}

fn print_colourful_prefix(prefix: &str, colour: Color, text: &str) {
    let writer = stderr_buffer_writer();
    let mut buffer = writer.buffer();

    write_prefix(&mut buffer, prefix, colour).expect("status prefix write");
    writeln!(buffer, " {text}").expect("status text write");

    writer.print(&buffer).expect("status print");
}

fn write_prefix(buffer: &mut Buffer, prefix: &str, colour: Color) -> std::io::Result<()> {
    buffer.set_color(
        ColorSpec::new()
            .set_intense(true)
            .set_bold(true)
            .set_fg(Some(colour)),
    )?;
    write!(buffer, "{prefix: >11}")?;
    buffer.set_color(&ColorSpec::new())
}

pub fn stderr_buffer_writer() -> BufferWriter {
    // Colours unless stderr is piped, or always under FORCE_COLOR.
    let choice = if std::env::var("FORCE_COLOR").is_ok_and(|force| !force.is_empty()) {
        ColorChoice::Always
    } else if std::io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };

    BufferWriter::stderr(choice)
}
