use owo_colors::OwoColorize;

use crate::{error::Result, model::TransitionData, store::Automaton};

impl Automaton {
    /// Renders the transition table of the automaton. Rows are states in increasing order of
    /// their ids, columns are events. Marked states are highlighted and the initial state is
    /// prefixed with an arrow. Bad transitions and violations are shown in red.
    pub fn transition_table(&self) -> Result<String> {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(
            std::iter::once("State".to_string())
                .chain(self.events().iter().map(|e| e.label().to_string())),
        );

        for state in self.states()? {
            let state = state?;
            let name = format!("{} {}", state.id(), state.label());
            let name = if state.is_marked() {
                name.bold().green().to_string()
            } else {
                name
            };
            let mut row = vec![if self.initial_state() == Some(state.id()) {
                format!("→ {name}")
            } else {
                name
            }];
            for event in self.events() {
                let targets = state
                    .transitions_on(event.id())
                    .map(|t| {
                        let data = TransitionData::new(state.id(), t.event, t.target);
                        let specials = self.special_transitions();
                        if specials.bad.contains(&data)
                            || specials.unconditional_violations.contains(&data)
                            || specials.conditional_violations.contains(&data)
                        {
                            t.target.red().to_string()
                        } else {
                            t.target.to_string()
                        }
                    })
                    .collect::<Vec<_>>();
                row.push(if targets.is_empty() {
                    "-".to_string()
                } else {
                    targets.join(",")
                });
            }
            builder.push_record(row);
        }

        Ok(builder
            .build()
            .with(tabled::settings::Style::rounded())
            .to_string())
    }
}
