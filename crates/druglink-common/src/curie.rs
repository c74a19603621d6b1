//! CURIE helpers ("PREFIX:local-id").

pub const DRUGBANK_PREFIX: &str = "DRUGBANK";

/// Prefixes present in the KG2 node synonymizer.
///
/// Used to tell a real CURIE ("HGNC:3535") apart from a bare identifier that
/// merely contains a colon.
pub const KG_PREFIXES: &[&str] = &[
    "AEO", "ARO", "ATC", "AraPort", "BAO", "BFO", "BSPO", "BTO", "CARO", "CAS", "CEPH", "CGNC", "CHEBI",
    "CHEMBL.COMPOUND", "CHEMBL.MECHANISM", "CHEMBL.TARGET", "CHMO", "CL", "CLO", "CP", "CVDO", "DDANAT",
    "DGIdb", "DOID", "DRUGBANK", "DisGeNET", "DrugCentral", "EC", "ECO", "ECOCORE", "ECTO", "EDAM", "EFO",
    "EHDAA2", "EMAPA", "ENSEMBL", "ENVO", "EO", "EPO", "ERO", "EnsemblGenomes", "ExO", "FAO", "FB", "FBbt",
    "FBdv", "FBgn", "FIX", "FLU", "FMA", "FOODON", "GAZ", "GENEPIO", "GENO", "GEO", "GO", "GOREL", "GTOPDB",
    "HANCESTRO", "HCPCS", "HGNC", "HMDB", "HP", "IAO", "ICD10", "ICD10PCS", "ICD9", "ICO", "IDO",
    "INCHIKEY", "JensenLab", "KEGG.COMPOUND", "KEGG.DISEASE", "KEGG.DRUG", "KEGG.ENZYME", "KEGG.GLYCAN",
    "KEGG.REACTION", "KEGG", "KEGG_source", "MA", "MAXO", "MEDDRA", "MESH", "MF", "MFOMD", "MGI", "MI",
    "MMO", "MOD", "MONDO", "MP", "MPATH", "NBO", "NCBIGene", "NCBITaxon", "NCIT", "NCRO", "NDDF", "OAE",
    "OBA", "OBAN", "OBI", "OBO", "OGG", "OGMS", "OIO", "OMIABIS", "OMIM.PS", "OMIM", "OMIT", "OMP", "OMRSE",
    "OPL", "ORPHANET", "PATO", "PCO", "PDQ", "PECO", "PO", "PR", "PSY", "PUBCHEM.COMPOUND", "PW",
    "PathWhiz.Bound", "PathWhiz.Compound", "PathWhiz.ElementCollection", "PathWhiz.NucleicAcid",
    "PathWhiz.ProteinComplex", "PathWhiz.Reaction", "PathWhiz", "PomBase", "REACT", "REPODB", "RGD",
    "RHEA", "RO", "RTX", "RXNORM", "SEMMEDDB", "SGD", "SIO", "SMPDB", "SNOMED", "SNOMEDCT", "SO", "STATO",
    "STY", "SYMP", "TCDB", "TO", "TRANS", "TypOn", "UBERON", "UBERON_CORE", "UBPROP", "UMLS",
    "UNICHEM_source", "UNII", "UO", "UPHENO", "UniProtKB", "VCARD", "VT", "WBbt", "WBls", "WormBase", "XCO",
    "ZEA", "ZFA", "ZFIN", "biolink", "biolink_download_source", "dbpedia", "dc", "dct", "dictyBase",
    "dictybase.gene", "doap", "ecogene", "foaf", "identifiers_org_registry", "linkml", "medgen", "miRBase",
    "owl", "rdf", "rdfs", "skos", "ttd.target", "umls_source", "wb",
];

/// Split a CURIE into (prefix, local id).
pub fn split(curie: &str) -> Option<(&str, &str)> {
    let (prefix, local) = curie.split_once(':')?;
    if prefix.is_empty() || local.is_empty() {
        return None;
    }
    Some((prefix, local))
}

pub fn prefix(curie: &str) -> Option<&str> {
    split(curie).map(|(p, _)| p)
}

/// True if the string starts with a prefix the knowledge graph knows about.
/// Case-insensitive ("UNIPROTKB:P00734" and "UniProtKB:P00734" both count).
pub fn has_known_prefix(s: &str) -> bool {
    match prefix(s) {
        Some(p) => KG_PREFIXES.iter().any(|known| known.eq_ignore_ascii_case(p)),
        None => false,
    }
}

/// Build `PREFIX:local`. A local id that already carries the prefix is kept as is.
pub fn namespaced(prefix: &str, local: &str) -> String {
    let local = local.trim();
    if let Some((p, _)) = split(local) {
        if p.eq_ignore_ascii_case(prefix) {
            return local.to_string();
        }
    }
    format!("{prefix}:{local}")
}

pub fn drugbank(id: &str) -> String {
    namespaced(DRUGBANK_PREFIX, id)
}
