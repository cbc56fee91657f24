/// 列所属层级
///
/// `Invoice` 列在合并表中按明细重复, 聚合前必须先按 access_key 去重;
/// `Item` 列每行唯一, 不允许去重。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnLevel {
    Invoice,
    Item,
}

/// 合并表的全部已知列 (声明顺序即输出顺序)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    AccessKey,
    Model,
    Series,
    Number,
    OperationNature,
    EmissionDate,
    EmissionTime,
    IssuerTaxId,
    IssuerName,
    IssuerStateRegistration,
    IssuerState,
    IssuerMunicipality,
    RecipientTaxId,
    RecipientName,
    RecipientState,
    RecipientRegistrationIndicator,
    OperationDestination,
    FinalConsumerFlag,
    BuyerPresence,
    ItemNumber,
    ItemDescription,
    NcmCode,
    NcmDescription,
    CfopCode,
    Quantity,
    Unit,
    UnitValue,
    TotalValue,
    LatestEvent,
    LatestEventDatetime,
    InvoiceTotalValue,
}

/// 缓存变体的 30 列
pub const CACHED_COLUMNS: [Column; 30] = [
    Column::AccessKey,
    Column::Model,
    Column::Series,
    Column::Number,
    Column::OperationNature,
    Column::EmissionDate,
    Column::EmissionTime,
    Column::IssuerTaxId,
    Column::IssuerName,
    Column::IssuerStateRegistration,
    Column::IssuerState,
    Column::IssuerMunicipality,
    Column::RecipientTaxId,
    Column::RecipientName,
    Column::RecipientState,
    Column::RecipientRegistrationIndicator,
    Column::OperationDestination,
    Column::FinalConsumerFlag,
    Column::BuyerPresence,
    Column::ItemNumber,
    Column::ItemDescription,
    Column::NcmCode,
    Column::NcmDescription,
    Column::CfopCode,
    Column::Quantity,
    Column::Unit,
    Column::UnitValue,
    Column::TotalValue,
    Column::LatestEvent,
    Column::LatestEventDatetime,
];

/// 非缓存变体: 30 列 + invoice_total_value
pub const ALL_COLUMNS: [Column; 31] = [
    Column::AccessKey,
    Column::Model,
    Column::Series,
    Column::Number,
    Column::OperationNature,
    Column::EmissionDate,
    Column::EmissionTime,
    Column::IssuerTaxId,
    Column::IssuerName,
    Column::IssuerStateRegistration,
    Column::IssuerState,
    Column::IssuerMunicipality,
    Column::RecipientTaxId,
    Column::RecipientName,
    Column::RecipientState,
    Column::RecipientRegistrationIndicator,
    Column::OperationDestination,
    Column::FinalConsumerFlag,
    Column::BuyerPresence,
    Column::ItemNumber,
    Column::ItemDescription,
    Column::NcmCode,
    Column::NcmDescription,
    Column::CfopCode,
    Column::Quantity,
    Column::Unit,
    Column::UnitValue,
    Column::TotalValue,
    Column::LatestEvent,
    Column::LatestEventDatetime,
    Column::InvoiceTotalValue,
];

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::AccessKey => "access_key",
            Column::Model => "model",
            Column::Series => "series",
            Column::Number => "number",
            Column::OperationNature => "operation_nature",
            Column::EmissionDate => "emission_date",
            Column::EmissionTime => "emission_time",
            Column::IssuerTaxId => "issuer_tax_id",
            Column::IssuerName => "issuer_name",
            Column::IssuerStateRegistration => "issuer_state_registration",
            Column::IssuerState => "issuer_state",
            Column::IssuerMunicipality => "issuer_municipality",
            Column::RecipientTaxId => "recipient_tax_id",
            Column::RecipientName => "recipient_name",
            Column::RecipientState => "recipient_state",
            Column::RecipientRegistrationIndicator => "recipient_registration_indicator",
            Column::OperationDestination => "operation_destination",
            Column::FinalConsumerFlag => "final_consumer_flag",
            Column::BuyerPresence => "buyer_presence",
            Column::ItemNumber => "item_number",
            Column::ItemDescription => "item_description",
            Column::NcmCode => "ncm_code",
            Column::NcmDescription => "ncm_description",
            Column::CfopCode => "cfop_code",
            Column::Quantity => "quantity",
            Column::Unit => "unit",
            Column::UnitValue => "unit_value",
            Column::TotalValue => "total_value",
            Column::LatestEvent => "latest_event",
            Column::LatestEventDatetime => "latest_event_datetime",
            Column::InvoiceTotalValue => "invoice_total_value",
        }
    }

    /// 源 CSV 表头 (葡语原始列名)。
    /// emission_date / emission_time 都由同一个 "DATA EMISSÃO" 拆分得到。
    pub fn source_header(self) -> &'static str {
        match self {
            Column::AccessKey => "CHAVE DE ACESSO",
            Column::Model => "MODELO",
            Column::Series => "SÉRIE",
            Column::Number => "NÚMERO",
            Column::OperationNature => "NATUREZA DA OPERAÇÃO",
            Column::EmissionDate | Column::EmissionTime => "DATA EMISSÃO",
            Column::IssuerTaxId => "CPF/CNPJ EMITENTE",
            Column::IssuerName => "RAZÃO SOCIAL EMITENTE",
            Column::IssuerStateRegistration => "INSCRIÇÃO ESTADUAL EMITENTE",
            Column::IssuerState => "UF EMITENTE",
            Column::IssuerMunicipality => "MUNICÍPIO EMITENTE",
            Column::RecipientTaxId => "CNPJ DESTINATÁRIO",
            Column::RecipientName => "NOME DESTINATÁRIO",
            Column::RecipientState => "UF DESTINATÁRIO",
            Column::RecipientRegistrationIndicator => "INDICADOR IE DESTINATÁRIO",
            Column::OperationDestination => "DESTINO DA OPERAÇÃO",
            Column::FinalConsumerFlag => "CONSUMIDOR FINAL",
            Column::BuyerPresence => "PRESENÇA DO COMPRADOR",
            Column::ItemNumber => "NÚMERO PRODUTO",
            Column::ItemDescription => "DESCRIÇÃO DO PRODUTO/SERVIÇO",
            Column::NcmCode => "CÓDIGO NCM/SH",
            Column::NcmDescription => "NCM/SH (TIPO DE PRODUTO)",
            Column::CfopCode => "CFOP",
            Column::Quantity => "QUANTIDADE",
            Column::Unit => "UNIDADE",
            Column::UnitValue => "VALOR UNITÁRIO",
            Column::TotalValue => "VALOR TOTAL",
            Column::LatestEvent => "EVENTO MAIS RECENTE",
            Column::LatestEventDatetime => "DATA/HORA EVENTO MAIS RECENTE",
            Column::InvoiceTotalValue => "VALOR NOTA FISCAL",
        }
    }

    /// 源表头的英文别名 (已经规范化过的导出文件使用)
    pub fn source_alias(self) -> &'static str {
        match self {
            Column::EmissionDate | Column::EmissionTime => "emission_datetime",
            other => other.name(),
        }
    }

    pub fn level(self) -> ColumnLevel {
        match self {
            Column::ItemNumber
            | Column::ItemDescription
            | Column::NcmCode
            | Column::NcmDescription
            | Column::CfopCode
            | Column::Quantity
            | Column::Unit
            | Column::UnitValue
            | Column::TotalValue => ColumnLevel::Item,
            _ => ColumnLevel::Invoice,
        }
    }

    /// 编码/标识列: 只按文本比较 (前导零有意义)
    pub fn is_identifier(self) -> bool {
        matches!(
            self,
            Column::AccessKey
                | Column::Model
                | Column::Series
                | Column::Number
                | Column::IssuerTaxId
                | Column::IssuerStateRegistration
                | Column::RecipientTaxId
                | Column::NcmCode
                | Column::CfopCode
        )
    }

    pub fn from_name(name: &str) -> Option<Column> {
        let name = name.trim();
        ALL_COLUMNS
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}
