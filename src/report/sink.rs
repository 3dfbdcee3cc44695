use std::io::Write;

use super::{Event, Result};

/// Destination of fully-formed events.
///
/// Delivery semantics (transport, retries, batching) belong to the
/// implementation; the probe only hands events over one at a time.
pub trait EventSink {
    fn send(&mut self, event: Event) -> Result<()>;
}

/// Collects events in memory.
impl EventSink for Vec<Event> {
    fn send(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

/// Writes every event as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn send(&mut self, event: Event) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Severity;

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let event = Event::new("docker web cpu_usage", Severity::Ok, "docker container cpu usage")
            .with_metric(0.25)
            .with_time(1700000000)
            .with_tags(["docker", "cpu"])
            .with_attribute("container", "web");
        sink.send(event.clone()).unwrap();
        sink.send(event).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "service": "docker web cpu_usage",
                "state": "ok",
                "description": "docker container cpu usage",
                "metric": 0.25,
                "tags": ["cpu", "docker"],
                "time": 1700000000,
                "container": "web"
            })
        );
    }
}
