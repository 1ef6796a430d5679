// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! `{placeholder}` interpolation for trigger messages

/// Values available to a message template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub count: usize,
    pub tool_name: Option<String>,
    pub tool_list: Option<String>,
}

impl TemplateVars {
    /// Substitute `{count}`, `{tool_name}` and `{tool_list}` in `template`.
    ///
    /// Placeholders without a value, and any other `{...}` text, are left as is.
    pub fn render(&self, template: &str) -> String {
        let mut out = template.replace("{count}", &self.count.to_string());
        if let Some(tool_name) = &self.tool_name {
            out = out.replace("{tool_name}", tool_name);
        }
        if let Some(tool_list) = &self.tool_list {
            out = out.replace("{tool_list}", tool_list);
        }
        out
    }
}
